//! Output naming.
//!
//! Every request names its outputs one of two ways: an explicit name from
//! the caller, or a suffix appended to the source matrix name. Requests that
//! produce one output per axis add an axis tag (`feature`, `condition`).

/// How output object names are derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingPolicy {
    /// Use this name (tagged outputs become `<name>_<tag>`).
    Explicit(String),
    /// Append to the source name (tagged outputs become
    /// `<source>_<tag><suffix>`).
    Suffix(String),
}

impl NamingPolicy {
    /// Explicit name when given and non-empty, otherwise `default_suffix`.
    pub fn explicit_or(name: Option<&str>, default_suffix: &str) -> Self {
        match name {
            Some(n) if !n.is_empty() => NamingPolicy::Explicit(n.to_string()),
            _ => NamingPolicy::Suffix(default_suffix.to_string()),
        }
    }

    /// Name of the output for `source`, optionally tagged with an axis.
    pub fn resolve(&self, source: &str, tag: Option<&str>) -> String {
        match (self, tag) {
            (NamingPolicy::Explicit(name), None) => name.clone(),
            (NamingPolicy::Explicit(name), Some(tag)) => format!("{name}_{tag}"),
            (NamingPolicy::Suffix(suffix), None) => format!("{source}{suffix}"),
            (NamingPolicy::Suffix(suffix), Some(tag)) => format!("{source}_{tag}{suffix}"),
        }
    }
}

/// Name of the `index`-th (0-based) cluster of a set, numbered from 1.
pub fn cluster_name(set_name: &str, index: usize) -> String {
    format!("{set_name}_{}", index + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit() {
        let policy = NamingPolicy::explicit_or(Some("my_set"), "_clusters");
        assert_eq!(policy.resolve("matrix", None), "my_set");
        assert_eq!(policy.resolve("matrix", Some("condition")), "my_set_condition");
    }

    #[test]
    fn test_suffix() {
        let policy = NamingPolicy::Suffix("_fs".into());
        assert_eq!(policy.resolve("expr", Some("feature")), "expr_feature_fs");
        assert_eq!(policy.resolve("expr", None), "expr_fs");
    }

    #[test]
    fn test_empty_name_falls_back_to_suffix() {
        let policy = NamingPolicy::explicit_or(Some(""), "_clusters");
        assert_eq!(policy, NamingPolicy::Suffix("_clusters".into()));
        assert_eq!(policy.resolve("expr", None), "expr_clusters");
    }

    #[test]
    fn test_cluster_name_is_one_based() {
        assert_eq!(cluster_name("set", 0), "set_1");
        assert_eq!(cluster_name("set", 9), "set_10");
    }
}
