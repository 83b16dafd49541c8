pub mod oauth;
pub mod token_manager;
pub mod token_store;
pub mod tokens_file;

use anyhow::{Result, anyhow};
use std::cell::RefCell;

/// Supplies a currently valid bearer token for the mail API.
pub trait TokenSource {
    fn access_token(&self) -> Result<String>;
}

impl<T: TokenSource + ?Sized> TokenSource for &T {
    fn access_token(&self) -> Result<String> {
        (**self).access_token()
    }
}

/// Token source that, once the wrapped source fails, keeps returning that
/// failure without consulting it again for the rest of the run.
pub struct FailFast<T> {
    inner: T,
    failure: RefCell<Option<String>>,
}

impl<T: TokenSource> FailFast<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            failure: RefCell::new(None),
        }
    }
}

impl<T: TokenSource> TokenSource for FailFast<T> {
    fn access_token(&self) -> Result<String> {
        if let Some(msg) = self.failure.borrow().as_ref() {
            return Err(anyhow!("authorization failed earlier in this run: {msg}"));
        }
        self.inner.access_token().inspect_err(|e| {
            *self.failure.borrow_mut() = Some(format!("{e:#}"));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Scripted {
        fail: bool,
        calls: Cell<u32>,
    }

    impl TokenSource for Scripted {
        fn access_token(&self) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                Err(anyhow!("refresh token revoked"))
            } else {
                Ok("ya29.token".to_string())
            }
        }
    }

    #[test]
    fn failing_source_is_consulted_once() {
        let tokens = FailFast::new(Scripted {
            fail: true,
            calls: Cell::new(0),
        });

        for _ in 0..5 {
            let err = tokens.access_token().unwrap_err();
            assert!(format!("{err:#}").contains("refresh token revoked"));
        }
        assert_eq!(tokens.inner.calls.get(), 1);
    }

    #[test]
    fn healthy_source_is_consulted_every_time() {
        let tokens = FailFast::new(Scripted {
            fail: false,
            calls: Cell::new(0),
        });

        assert_eq!(tokens.access_token().unwrap(), "ya29.token");
        assert_eq!(tokens.access_token().unwrap(), "ya29.token");
        assert_eq!(tokens.inner.calls.get(), 2);
    }
}
