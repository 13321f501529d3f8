use super::RequestProcessor;
use crate::error::SpiderError;
use crate::request::Request;
use async_trait::async_trait;
use log::trace;
use rand::Rng;
use std::time::Duration;

/// Sleeps before each request.
///
/// With `randomize`, the wait is drawn uniformly from `[0.5 * delay, 1.5 * delay]`.
#[derive(Debug, Clone, Copy)]
pub struct Delay {
    delay: Duration,
    randomize: bool,
}

impl Delay {
    pub fn new(delay: Duration, randomize: bool) -> Self {
        Self { delay, randomize }
    }

    fn next_wait(&self) -> Duration {
        if self.randomize {
            self.delay.mul_f64(rand::thread_rng().gen_range(0.5..=1.5))
        } else {
            self.delay
        }
    }
}

#[async_trait]
impl RequestProcessor for Delay {
    fn name(&self) -> &str {
        "Delay"
    }

    async fn process_request(&self, request: &mut Request) -> Result<(), SpiderError> {
        if self.delay.is_zero() {
            return Ok(());
        }
        let wait = self.next_wait();
        trace!("Delaying {} by {:?}", request.url, wait);
        tokio::time::sleep(wait).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn randomized_wait_stays_within_both_bounds() {
        let delay = Delay::new(Duration::from_millis(100), true);
        for _ in 0..200 {
            let wait = delay.next_wait();
            assert!(wait >= Duration::from_millis(50));
            assert!(wait <= Duration::from_millis(150));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_fixed_delay() {
        let delay = Delay::new(Duration::from_secs(2), false);
        let mut request = Request::get("https://example.com/").unwrap();
        let start = tokio::time::Instant::now();
        delay.process_request(&mut request).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
