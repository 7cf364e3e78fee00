//! Async connector capabilities.
//!
//! Async connectors never see the heap. They exchange owned [`Value`] trees,
//! and the system imports results once the future resolves.
//!
//! Enable the `async` feature to use these traits:
//!
//! ```toml
//! [dependencies]
//! urlstore-core = { version = "0.1", features = ["async"] }
//! ```

use async_trait::async_trait;

use crate::{Result, Url, Value};

/// Async version of [`SyncGet`](crate::SyncGet).
///
/// # Object Safety
///
/// This trait is object-safe: you can use `&dyn AsyncGet`.
#[async_trait]
pub trait AsyncGet: Send + Sync {
    /// Fetch the value at `url` (fragment already stripped).
    async fn get_async(&self, url: &Url) -> Result<Option<Value>>;
}

/// Async version of [`SyncPut`](crate::SyncPut).
#[async_trait]
pub trait AsyncPut: Send + Sync {
    /// Store `value` at `url`, returning the value as stored.
    async fn put_async(&self, url: &Url, value: Value) -> Result<Value>;

    async fn remove_async(&self, url: &Url) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Capabilities, Connector};
    use std::sync::Mutex;

    struct Echo {
        last: Mutex<Option<Value>>,
    }

    #[async_trait]
    impl AsyncGet for Echo {
        async fn get_async(&self, _url: &Url) -> Result<Option<Value>> {
            Ok(self.last.lock().map(|v| v.clone()).unwrap_or(None))
        }
    }

    #[async_trait]
    impl AsyncPut for Echo {
        async fn put_async(&self, _url: &Url, value: Value) -> Result<Value> {
            if let Ok(mut last) = self.last.lock() {
                *last = Some(value.clone());
            }
            Ok(value)
        }

        async fn remove_async(&self, _url: &Url) -> Result<()> {
            if let Ok(mut last) = self.last.lock() {
                *last = None;
            }
            Ok(())
        }
    }

    impl Connector for Echo {
        fn as_async_get(&self) -> Option<&dyn AsyncGet> {
            Some(self)
        }

        fn as_async_put(&self) -> Option<&dyn AsyncPut> {
            Some(self)
        }
    }

    #[tokio::test]
    async fn async_capabilities_round_trip() {
        let mut echo = Echo {
            last: Mutex::new(None),
        };
        assert_eq!(
            echo.capabilities(),
            Capabilities::ASYNC_GET | Capabilities::ASYNC_PUT
        );

        let url = Url::parse("echo:/x").unwrap();
        let put = echo.as_async_put().unwrap();
        put.put_async(&url, Value::from("hi")).await.unwrap();
        let got = echo.as_async_get().unwrap().get_async(&url).await.unwrap();
        assert_eq!(got, Some(Value::from("hi")));

        echo.as_async_put().unwrap().remove_async(&url).await.unwrap();
        let got = echo.as_async_get().unwrap().get_async(&url).await.unwrap();
        assert_eq!(got, None);
    }
}
