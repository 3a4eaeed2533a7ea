use std::thread;
use std::time::Duration;

use log::warn;

use crate::error::PersistenceError;

const MAX_RETRIES: u32 = 3;

/// Repite `f` ante errores transitorios (hasta 3 reintentos).
///
/// Backoff lineal: 15ms, 30ms, 45ms, con un `warn!` por intento.
pub(crate) fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if e.is_transient() && attempts < MAX_RETRIES => {
                let delay_ms = 15 * u64::from(attempts + 1);
                warn!("transient persistence error (attempt {}): {e} -> sleeping {delay_ms}ms", attempts + 1);
                thread::sleep(Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn retries_only_transient_errors() {
        let mut calls = 0;
        let out = with_retry(|| {
                      calls += 1;
                      if calls < 3 {
                          Err(PersistenceError::io("x", io::Error::from(io::ErrorKind::Interrupted)))
                      } else {
                          Ok(calls)
                      }
                  });
        assert_eq!(out.unwrap(), 3);

        let mut calls = 0;
        let out: Result<(), _> = with_retry(|| {
                                     calls += 1;
                                     Err(PersistenceError::io("x", io::Error::from(io::ErrorKind::NotFound)))
                                 });
        assert!(out.is_err());
        assert_eq!(calls, 1);

        let mut calls = 0;
        let out: Result<(), _> = with_retry(|| {
                                     calls += 1;
                                     Err(PersistenceError::io("x", io::Error::from(io::ErrorKind::TimedOut)))
                                 });
        assert!(out.is_err());
        assert_eq!(calls, 4);
    }
}
