//! Ciclo de vida de servicios de fondo (p.ej. un daemon local de metadata).
//!
//! Desde el core, `provision`/`resume` son fire-and-forget: el servicio corre
//! desacoplado y sólo se consulta su liveness con un bucle de reintentos
//! acotado, nunca bloqueando indefinidamente.

use std::time::Duration;

use log::{debug, warn};

use crate::config::StackflowConfig;
use crate::errors::StackError;

pub trait ServiceLifecycle: Send + Sync {
    fn name(&self) -> &str;

    fn provision(&self) -> Result<(), StackError>;

    fn resume(&self) -> Result<(), StackError>;

    fn suspend(&self) -> Result<(), StackError>;

    fn deprovision(&self) -> Result<(), StackError>;

    fn is_running(&self) -> bool;
}

/// Política de sondeo de liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl LivenessPolicy {
    pub fn from_config(config: &StackflowConfig) -> Self {
        Self { max_attempts: config.liveness_max_attempts.max(1),
               interval: Duration::from_millis(config.liveness_interval_ms) }
    }
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        Self::from_config(&StackflowConfig::default())
    }
}

/// Sondea `is_running` hasta `max_attempts` veces. Devuelve el número de
/// intentos usados.
pub fn wait_until_running(service: &dyn ServiceLifecycle, policy: &LivenessPolicy) -> Result<u32, StackError> {
    for attempt in 1..=policy.max_attempts {
        if service.is_running() {
            debug!("service '{}' alive after {attempt} attempt(s)", service.name());
            return Ok(attempt);
        }
        if attempt < policy.max_attempts {
            std::thread::sleep(policy.interval);
        }
    }
    warn!("service '{}' not running after {} attempts", service.name(), policy.max_attempts);
    Err(StackError::ServiceTimeout { service: service.name().to_string(),
                                     attempts: policy.max_attempts })
}

pub fn provision_and_wait(service: &dyn ServiceLifecycle, policy: &LivenessPolicy) -> Result<(), StackError> {
    service.provision()?;
    wait_until_running(service, policy).map(|_| ())
}

pub fn resume_and_wait(service: &dyn ServiceLifecycle, policy: &LivenessPolicy) -> Result<(), StackError> {
    service.resume()?;
    wait_until_running(service, policy).map(|_| ())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Servicio que reporta vida recién en la N-ésima consulta.
    struct SlowStart {
        polls: AtomicU32,
        alive_at: u32,
    }

    impl ServiceLifecycle for SlowStart {
        fn name(&self) -> &str {
            "slow"
        }
        fn provision(&self) -> Result<(), StackError> {
            Ok(())
        }
        fn resume(&self) -> Result<(), StackError> {
            Ok(())
        }
        fn suspend(&self) -> Result<(), StackError> {
            Ok(())
        }
        fn deprovision(&self) -> Result<(), StackError> {
            Ok(())
        }
        fn is_running(&self) -> bool {
            self.polls.fetch_add(1, Ordering::SeqCst) + 1 >= self.alive_at
        }
    }

    #[test]
    fn polling_is_bounded() {
        let policy = LivenessPolicy { max_attempts: 3,
                                      interval: Duration::from_millis(1) };
        let ok = SlowStart { polls: AtomicU32::new(0),
                             alive_at: 3 };
        assert_eq!(wait_until_running(&ok, &policy), Ok(3));

        let never = SlowStart { polls: AtomicU32::new(0),
                                alive_at: 10 };
        assert_eq!(provision_and_wait(&never, &policy),
                   Err(StackError::ServiceTimeout { service: "slow".into(),
                                                    attempts: 3 }));
        assert_eq!(never.polls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn resume_waits_for_liveness() {
        let policy = LivenessPolicy { max_attempts: 4,
                                      interval: Duration::from_millis(1) };
        let waking = SlowStart { polls: AtomicU32::new(0),
                                 alive_at: 2 };
        assert_eq!(resume_and_wait(&waking, &policy), Ok(()));
        assert_eq!(waking.polls.load(Ordering::SeqCst), 2);

        let asleep = SlowStart { polls: AtomicU32::new(0),
                                 alive_at: 9 };
        assert!(matches!(resume_and_wait(&asleep, &policy), Err(StackError::ServiceTimeout { attempts: 4, .. })));
    }
}
