use std::fmt;

/// Fully qualified publish topic of one channel.
///
/// Built once when the channel is created, the string is reused for every
/// publish afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topic(String);

impl Topic {
    /// `<base>/<device>/<suffix>`, or `<base>/<device>` when `suffix` is `None`.
    pub fn new(base: &str, device_id: &str, suffix: Option<&str>) -> Self {
        let base = base.trim_end_matches('/');
        match suffix {
            Some(suffix) => Topic(format!("{}/{}/{}", base, device_id, suffix)),
            None => Topic(format!("{}/{}", base, device_id)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}
