use log::{error, info, warn};
use std::time::Duration;

use crate::aggregate::sender_summary;
use crate::domain::message::MessageId;
use crate::mail::enricher::Enricher;
use crate::mail::fetcher::list_message_ids;
use crate::mail::service::MailService;
use crate::report::Reporter;
use crate::store::repo::MessageRepository;

pub struct SyncOptions {
    /// Fetch and store new message ids before enriching.
    pub seed: bool,
    pub query: String,
}

/// What a run achieved. Degraded runs still return normally.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Rows newly inserted by the seed step.
    pub seeded: usize,
    /// False when the listing stopped early or seeding could not be stored.
    pub harvest_complete: bool,
    pub enriched: usize,
    /// Pending ids left for a later run.
    pub skipped: Vec<MessageId>,
    pub report_written: bool,
}

/// Seed, enrich, report.
pub struct SyncOrchestrator<'a> {
    repo: &'a dyn MessageRepository,
    mail: &'a dyn MailService,
    reporter: &'a dyn Reporter,
    enricher: Enricher<'a>,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(
        repo: &'a dyn MessageRepository,
        mail: &'a dyn MailService,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            repo,
            mail,
            reporter,
            enricher: Enricher::new(mail),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.enricher = self.enricher.with_retry_delay(delay);
        self
    }

    pub fn run(&self, opts: &SyncOptions) -> SyncSummary {
        let mut summary = SyncSummary {
            harvest_complete: true,
            ..SyncSummary::default()
        };

        if opts.seed {
            self.seed(&opts.query, &mut summary);
        }
        self.enrich_pending(&mut summary);
        summary.report_written = self.report();

        info!(
            "Sync done: {} seeded, {} enriched, {} left pending{}",
            summary.seeded,
            summary.enriched,
            summary.skipped.len(),
            if summary.harvest_complete {
                ""
            } else {
                " (partial harvest)"
            }
        );
        summary
    }

    fn seed(&self, query: &str, summary: &mut SyncSummary) {
        info!("Listing messages matching {query:?}");
        let harvest = list_message_ids(self.mail, query);
        summary.harvest_complete = harvest.is_complete();

        match self.repo.insert_pending(&harvest.ids) {
            Ok(n) => {
                info!("Stored {n} new of {} listed message(s)", harvest.ids.len());
                summary.seeded = n;
            }
            Err(e) => {
                error!("Error storing {} message id(s): {e}", harvest.ids.len());
                summary.harvest_complete = false;
            }
        }
    }

    fn enrich_pending(&self, summary: &mut SyncSummary) {
        let pending = match self.repo.list_pending() {
            Ok(p) => p,
            Err(e) => {
                error!("Error reading pending messages: {e}");
                return;
            }
        };

        for record in pending {
            let id = record.message_id;
            let sender = match self.enricher.fetch_sender(&id) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Skipping: {e}");
                    summary.skipped.push(id);
                    continue;
                }
            };

            match self.repo.set_sender(&id, &sender) {
                Ok(()) => {
                    info!("{id} -> {sender}");
                    summary.enriched += 1;
                }
                Err(e) => {
                    error!("Error updating message {id}: {e}");
                    summary.skipped.push(id);
                }
            }
        }
    }

    /// Renders the current store state; false if nothing was written.
    pub fn report(&self) -> bool {
        render_report(self.repo, self.reporter)
    }
}

/// Aggregates `repo` and hands the result to `reporter`, logging failures.
/// Returns whether a report was written.
pub fn render_report(repo: &dyn MessageRepository, reporter: &dyn Reporter) -> bool {
    let senders = match sender_summary(repo) {
        Ok(s) => s,
        Err(e) => {
            error!("Error aggregating senders: {e}");
            return false;
        }
    };
    match reporter.render(&senders) {
        Ok(()) => true,
        Err(e) => {
            error!("Error rendering report: {e:#}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::{MessageRecord, SenderCount};
    use crate::error::{StorageError, TransportError};
    use crate::mail::service::{MessageHeader, MessageListPage, MessageRef};
    use crate::store::sqlite::SqliteRepo;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeMailbox {
        pages: Vec<Vec<&'static str>>,
        senders: HashMap<&'static str, &'static str>,
        /// Listing this page index fails with a server error.
        failing_page: Option<usize>,
        header_calls: RefCell<Vec<String>>,
    }

    impl FakeMailbox {
        fn with_pages(pages: Vec<Vec<&'static str>>) -> Self {
            Self {
                pages,
                ..Self::default()
            }
        }

        fn sender(mut self, id: &'static str, from: &'static str) -> Self {
            self.senders.insert(id, from);
            self
        }
    }

    impl MailService for FakeMailbox {
        fn list_messages(
            &self,
            _query: &str,
            page_token: Option<&str>,
        ) -> Result<MessageListPage, TransportError> {
            let idx: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
            if self.failing_page == Some(idx) {
                return Err(TransportError::Status {
                    status: 500,
                    detail: "Backend Error".into(),
                });
            }
            let next = idx + 1;
            Ok(MessageListPage {
                messages: self.pages[idx]
                    .iter()
                    .map(|id| MessageRef {
                        id: id.to_string(),
                        thread_id: None,
                    })
                    .collect(),
                next_page_token: (next < self.pages.len()).then(|| next.to_string()),
            })
        }

        fn message_headers(&self, id: &str) -> Result<Vec<MessageHeader>, TransportError> {
            self.header_calls.borrow_mut().push(id.to_string());
            match self.senders.get(id) {
                Some(from) => Ok(vec![MessageHeader::new("From", *from)]),
                None => Err(TransportError::Status {
                    status: 404,
                    detail: "Requested entity was not found.".into(),
                }),
            }
        }
    }

    struct BrokenReporter;

    impl Reporter for BrokenReporter {
        fn render(&self, _summary: &[SenderCount]) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("disk full"))
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        renders: RefCell<Vec<Vec<SenderCount>>>,
    }

    impl Reporter for RecordingReporter {
        fn render(&self, summary: &[SenderCount]) -> anyhow::Result<()> {
            self.renders.borrow_mut().push(summary.to_vec());
            Ok(())
        }
    }

    /// Store whose updates always fail.
    struct ReadOnlyRepo(SqliteRepo);

    impl MessageRepository for ReadOnlyRepo {
        fn ensure_schema(&self) -> Result<(), StorageError> {
            self.0.ensure_schema()
        }
        fn insert_pending(&self, _ids: &[String]) -> Result<usize, StorageError> {
            Err(StorageError::Sqlite(rusqlite::Error::InvalidQuery))
        }
        fn list_pending(&self) -> Result<Vec<MessageRecord>, StorageError> {
            self.0.list_pending()
        }
        fn set_sender(&self, _id: &str, _sender: &str) -> Result<(), StorageError> {
            Err(StorageError::Sqlite(rusqlite::Error::InvalidQuery))
        }
        fn aggregate_by_sender(&self) -> Result<Vec<SenderCount>, StorageError> {
            self.0.aggregate_by_sender()
        }
    }

    fn seeding() -> SyncOptions {
        SyncOptions {
            seed: true,
            query: "label:inbox".into(),
        }
    }

    fn enrich_only() -> SyncOptions {
        SyncOptions {
            seed: false,
            query: "label:inbox".into(),
        }
    }

    fn pending_ids(repo: &SqliteRepo) -> Vec<String> {
        repo.list_pending()
            .unwrap()
            .into_iter()
            .map(|r| r.message_id)
            .collect()
    }

    #[test]
    fn seeded_run_enriches_what_it_can() {
        let repo = SqliteRepo::open_in_memory().unwrap();
        let mail = FakeMailbox::with_pages(vec![vec!["m1", "m2"]]).sender("m1", "X <x@y.com>");
        let reporter = RecordingReporter::default();

        let summary = SyncOrchestrator::new(&repo, &mail, &reporter)
            .with_retry_delay(Duration::ZERO)
            .run(&seeding());

        assert_eq!(
            summary,
            SyncSummary {
                seeded: 2,
                harvest_complete: true,
                enriched: 1,
                skipped: vec!["m2".to_string()],
                report_written: true,
            }
        );
        assert_eq!(pending_ids(&repo), ["m2"]);
        assert_eq!(
            *reporter.renders.borrow(),
            vec![vec![
                SenderCount::new(1, Some("x@y.com")),
                SenderCount::new(1, None),
            ]]
        );
    }

    #[test]
    fn partial_listing_is_seeded_enriched_and_reported() {
        let repo = SqliteRepo::open_in_memory().unwrap();
        let mut mail = FakeMailbox::with_pages(vec![vec!["m1", "m2"], vec!["m3"]])
            .sender("m1", "a@x.com")
            .sender("m2", "Bob <b@x.com>")
            .sender("m3", "c@x.com");
        mail.failing_page = Some(1);
        let reporter = RecordingReporter::default();

        let summary = SyncOrchestrator::new(&repo, &mail, &reporter).run(&seeding());

        assert_eq!(
            summary,
            SyncSummary {
                seeded: 2,
                harvest_complete: false,
                enriched: 2,
                skipped: vec![],
                report_written: true,
            }
        );
        assert!(pending_ids(&repo).is_empty());
        assert_eq!(*mail.header_calls.borrow(), ["m1", "m2"]);
        assert_eq!(
            *reporter.renders.borrow(),
            vec![vec![
                SenderCount::new(1, Some("a@x.com")),
                SenderCount::new(1, Some("b@x.com")),
            ]]
        );
    }

    #[test]
    fn one_failure_does_not_stop_the_others() {
        let repo = SqliteRepo::open_in_memory().unwrap();
        let mail = FakeMailbox::with_pages(vec![vec!["m1", "m2"], vec!["m3", "m4", "m5"]])
            .sender("m1", "a@x.com")
            .sender("m2", "b@x.com")
            .sender("m4", "a@x.com")
            .sender("m5", "Carol <c@x.com>");
        let reporter = RecordingReporter::default();

        let summary = SyncOrchestrator::new(&repo, &mail, &reporter).run(&seeding());

        assert_eq!(summary.enriched, 4);
        assert_eq!(summary.skipped, ["m3"]);
        assert_eq!(pending_ids(&repo), ["m3"]);
        assert_eq!(
            repo.aggregate_by_sender().unwrap(),
            vec![
                SenderCount::new(2, Some("a@x.com")),
                SenderCount::new(1, Some("b@x.com")),
                SenderCount::new(1, None),
                SenderCount::new(1, Some("c@x.com")),
            ]
        );
    }

    #[test]
    fn enriched_messages_are_never_fetched_again() {
        let repo = SqliteRepo::open_in_memory().unwrap();
        let mail = FakeMailbox::with_pages(vec![vec!["m1", "m2"]])
            .sender("m1", "a@x.com")
            .sender("m2", "b@x.com");
        let reporter = RecordingReporter::default();
        let sync = SyncOrchestrator::new(&repo, &mail, &reporter);

        sync.run(&seeding());
        let second = sync.run(&enrich_only());

        assert_eq!(second.enriched, 0);
        assert_eq!(*mail.header_calls.borrow(), ["m1", "m2"]);
        assert_eq!(
            repo.aggregate_by_sender().unwrap(),
            vec![
                SenderCount::new(1, Some("a@x.com")),
                SenderCount::new(1, Some("b@x.com")),
            ]
        );
    }

    #[test]
    fn reseeding_overlapping_ids_adds_only_new_rows() {
        let repo = SqliteRepo::open_in_memory().unwrap();
        let reporter = RecordingReporter::default();

        let first = FakeMailbox::with_pages(vec![vec!["m1", "m2"]]);
        let s1 = SyncOrchestrator::new(&repo, &first, &reporter).run(&seeding());
        let second = FakeMailbox::with_pages(vec![vec!["m2", "m3"]]);
        let s2 = SyncOrchestrator::new(&repo, &second, &reporter).run(&seeding());

        assert_eq!((s1.seeded, s2.seeded), (2, 1));
        assert_eq!(pending_ids(&repo), ["m1", "m2", "m3"]);
        // first run skipped m1 and m2, second run retried them
        assert_eq!(*second.header_calls.borrow(), ["m1", "m2", "m3"]);
    }

    #[test]
    fn enrich_only_run_does_not_list() {
        let repo = SqliteRepo::open_in_memory().unwrap();
        repo.insert_pending(&["m1".to_string()]).unwrap();
        // no pages: listing would panic on index 0
        let mail = FakeMailbox::with_pages(vec![]).sender("m1", "a@x.com");
        let reporter = RecordingReporter::default();

        let summary = SyncOrchestrator::new(&repo, &mail, &reporter).run(&enrich_only());

        assert_eq!(summary.seeded, 0);
        assert_eq!(summary.enriched, 1);
        assert!(pending_ids(&repo).is_empty());
    }

    #[test]
    fn store_failures_degrade_without_aborting() {
        let inner = SqliteRepo::open_in_memory().unwrap();
        inner.insert_pending(&["m1".to_string()]).unwrap();
        let repo = ReadOnlyRepo(inner);
        let mail = FakeMailbox::with_pages(vec![vec!["m2"]]).sender("m1", "a@x.com");
        let reporter = RecordingReporter::default();

        let summary = SyncOrchestrator::new(&repo, &mail, &reporter).run(&seeding());

        assert!(!summary.harvest_complete);
        assert_eq!(summary.seeded, 0);
        assert_eq!(summary.enriched, 0);
        assert_eq!(summary.skipped, ["m1"]);
        assert!(summary.report_written);
        assert_eq!(
            *reporter.renders.borrow(),
            vec![vec![SenderCount::new(1, None)]]
        );
    }

    #[test]
    fn render_report_reports_renderer_failure() {
        let repo = SqliteRepo::open_in_memory().unwrap();
        repo.insert_pending(&["m1".to_string()]).unwrap();

        assert!(!render_report(&repo, &BrokenReporter));
        assert!(render_report(&repo, &RecordingReporter::default()));
    }

    #[test]
    fn report_renders_current_state() {
        let repo = SqliteRepo::open_in_memory().unwrap();
        repo.insert_pending(&["m1".to_string(), "m2".to_string()])
            .unwrap();
        repo.set_sender("m1", "a@x.com").unwrap();
        let mail = FakeMailbox::default();
        let reporter = RecordingReporter::default();

        assert!(SyncOrchestrator::new(&repo, &mail, &reporter).report());
        assert!(mail.header_calls.borrow().is_empty());
        assert_eq!(
            *reporter.renders.borrow(),
            vec![vec![
                SenderCount::new(1, Some("a@x.com")),
                SenderCount::new(1, None),
            ]]
        );
    }
}
