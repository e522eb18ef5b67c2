//! Fixed-width value histograms

/// Equal-width histogram of finite values
///
/// The buckets span `[min, max]` of the sampled values. `bucket_means[k]` is
/// the mean of the values in bucket `k`, or its center when it is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub min: f64,
    pub max: f64,
    pub bucket_width: f64,
    pub counts: Vec<u64>,
    pub bucket_means: Vec<f64>,
}

impl Histogram {
    /// Bucket the finite values into at most `max_buckets` buckets.
    ///
    /// Returns `None` when no finite value is present. When all values are
    /// equal the histogram holds a single bucket.
    pub fn from_values<I>(values: I, max_buckets: usize) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let values: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        if values.is_empty() {
            return None;
        }

        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

        let n = if max > min { max_buckets.max(1) } else { 1 };
        let bucket_width = if n > 1 { (max - min) / n as f64 } else { 0.0 };

        let mut counts = vec![0u64; n];
        let mut sums = vec![0.0; n];
        for &v in &values {
            let idx = if n > 1 {
                (((v - min) / bucket_width).floor() as usize).min(n - 1)
            } else {
                0
            };
            counts[idx] += 1;
            sums[idx] += v;
        }

        let bucket_means = if n == 1 {
            vec![min]
        } else {
            counts
                .iter()
                .zip(&sums)
                .enumerate()
                .map(|(k, (&c, &s))| match c {
                    0 => min + (k as f64 + 0.5) * bucket_width,
                    _ => s / c as f64,
                })
                .collect()
        };

        Some(Self {
            min,
            max,
            bucket_width,
            counts,
            bucket_means,
        })
    }

    /// Number of buckets
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total number of bucketed values
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_histogram_buckets() {
        let h = Histogram::from_values(vec![0.0, 1.0, 2.0, 3.0, 4.0, f64::NAN], 4).unwrap();
        assert_eq!(h.len(), 4);
        // max lands in the last bucket
        assert_eq!(h.counts, vec![1, 1, 1, 2]);
        assert_eq!(h.total(), 5);
        assert_relative_eq!(h.bucket_width, 1.0);
        assert_relative_eq!(h.bucket_means[0], 0.0);
        assert_relative_eq!(h.bucket_means[1], 1.0);
        assert_relative_eq!(h.bucket_means[3], 3.5);
    }

    #[test]
    fn test_bucket_means_follow_values() {
        // Skewed bucket: the mean sits near its lower edge, not its center
        let h = Histogram::from_values(vec![0.0, 0.1, 0.2, 4.0], 4).unwrap();
        assert_eq!(h.counts, vec![3, 0, 0, 1]);
        assert_relative_eq!(h.bucket_means[0], 0.1, epsilon = 1e-12);
        // Empty buckets fall back to their centers
        assert_relative_eq!(h.bucket_means[1], 1.5);
        assert_relative_eq!(h.bucket_means[2], 2.5);
        assert_relative_eq!(h.bucket_means[3], 4.0);
    }

    #[test]
    fn test_histogram_constant_values() {
        let h = Histogram::from_values(vec![2.5; 10], 255).unwrap();
        assert_eq!(h.len(), 1);
        assert_eq!(h.counts, vec![10]);
        assert_relative_eq!(h.bucket_means[0], 2.5);
    }

    #[test]
    fn test_histogram_empty() {
        assert!(Histogram::from_values(vec![f64::NAN, f64::INFINITY], 255).is_none());
        assert!(Histogram::from_values(Vec::new(), 255).is_none());
    }
}
