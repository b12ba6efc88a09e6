use std::time::Instant;
use tokio::sync::Mutex;
use tokio::time::Duration;

struct Bucket {
    available: f64,
    last_refill: Instant,
}

/// Token-bucket limiter over replay bandwidth. The configured throttle is a
/// cluster-wide budget, so each node divides it across however many peers it
/// might simultaneously be replaying hints to.
pub struct RateLimiter {
    rate_bytes_per_sec: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// `global_throttle_kb` of zero, or a `cluster_size` of one or fewer,
    /// means unlimited: there's nobody else to share a fair share with.
    pub fn new(global_throttle_kb: u64, cluster_size: usize) -> Self {
        let rate_bytes_per_sec = if global_throttle_kb == 0 || cluster_size <= 1 {
            0.0
        } else {
            (global_throttle_kb * 1024) as f64 / (cluster_size - 1) as f64
        };

        Self {
            rate_bytes_per_sec,
            bucket: Mutex::new(Bucket {
                available: rate_bytes_per_sec,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.rate_bytes_per_sec == 0.0
    }

    pub async fn acquire(&self, n_bytes: usize) {
        if self.is_unlimited() {
            return;
        }

        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
                bucket.last_refill = now;
                bucket.available =
                    (bucket.available + elapsed * self.rate_bytes_per_sec).min(self.rate_bytes_per_sec);

                if n_bytes as f64 <= bucket.available {
                    bucket.available -= n_bytes as f64;
                    None
                } else {
                    let deficit = n_bytes as f64 - bucket.available;
                    bucket.available = 0.0;
                    Some(Duration::from_secs_f64(deficit / self.rate_bytes_per_sec))
                }
            };

            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }
}
