use crate::{Error, Headers, Result};
use async_io::Timer;
use encoding_rs::Encoding;
use futures_lite::FutureExt;
use mime::Mime;
use std::{future::Future, str::FromStr, time::Duration};

/// Extract the character encoding from a set of [`Headers`], as
/// determined by the content-type charset parameter. Defaults to
/// windows-1252, the web's historical fallback for `text/*` content.
pub fn encoding(headers: &Headers) -> &'static Encoding {
    headers
        .get_str("content-type")
        .and_then(|c| Mime::from_str(c).ok())
        .and_then(|m| {
            m.params()
                .find(|(name, _)| name.as_str() == "charset")
                .and_then(|(_, v)| Encoding::for_label(v.as_str().as_bytes()))
        })
        .unwrap_or(encoding_rs::WINDOWS_1252)
}

/// Race a fallible future against a deadline, surfacing
/// [`Error::Timeout`] when the deadline wins.
pub async fn deadline<F, T>(duration: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    future
        .or(async {
            Timer::after(duration).await;
            Err(Error::Timeout)
        })
        .await
}

#[cfg(test)]
mod test {
    use super::*;
    use futures_lite::future::block_on;

    #[test]
    fn charset_extraction() {
        let mut headers = Headers::new();
        assert_eq!(encoding(&headers), encoding_rs::WINDOWS_1252);

        headers.insert("content-type", "text/plain;charset=utf-8");
        assert_eq!(encoding(&headers), encoding_rs::UTF_8);

        headers.insert("content-type", "text/plain;charset=utf-16");
        assert_eq!(encoding(&headers), encoding_rs::UTF_16LE);
    }

    #[test]
    fn deadlines_fire() {
        block_on(async {
            let result = deadline(Duration::from_millis(10), async {
                futures_lite::future::pending::<Result<()>>().await
            })
            .await;
            assert!(matches!(result, Err(Error::Timeout)));
        });

        block_on(async {
            let result = deadline(Duration::from_secs(5), async { Ok(7) }).await;
            assert_eq!(result.unwrap(), 7);
        });
    }
}
