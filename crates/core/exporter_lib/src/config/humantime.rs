/// A duration in the configuration, written as a human-readable string like `"5s"` or `"1min"`
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(transparent)]
pub struct Humantime(#[serde(with = "humantime_serde")] std::time::Duration);

impl Humantime {
    pub fn into_duration(self) -> std::time::Duration {
        self.0
    }
}

impl From<std::time::Duration> for Humantime {
    fn from(d: std::time::Duration) -> Self {
        Humantime(d)
    }
}
