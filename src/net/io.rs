//! I/O 支持：将接受网（网 + 初始/终止标识）以 JSON、RON 形式交给下游分析。
use std::fs;
use std::path::Path;

use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::net::core::{Net, NetError};
use crate::net::structure::Marking;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ron error: {0}")]
    Ron(#[from] ron::Error),
    #[error("ron parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decoded net is inconsistent: {0}")]
    Net(#[from] NetError),
}

/// The finished net together with the markings collaborators start from and aim for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcceptingNet {
    pub net: Net,
    pub initial_marking: Marking,
    pub final_marking: Marking,
}

impl AcceptingNet {
    pub fn new(net: Net, initial_marking: Marking, final_marking: Marking) -> Self {
        Self {
            net,
            initial_marking,
            final_marking,
        }
    }

    pub fn to_json(&self) -> Result<String, IoError> {
        to_json_string(self)
    }

    /// Decodes and re-checks the arc mirrors, since the payload may come from anywhere.
    pub fn from_json(s: &str) -> Result<Self, IoError> {
        let decoded: Self = from_json_str(s)?;
        decoded.net.check_consistency()?;
        Ok(decoded)
    }

    pub fn to_ron(&self) -> Result<String, IoError> {
        to_ron_string(self)
    }

    pub fn from_ron(s: &str) -> Result<Self, IoError> {
        let decoded: Self = from_ron_str(s)?;
        decoded.net.check_consistency()?;
        Ok(decoded)
    }

    pub fn to_dot(&self) -> String {
        self.net.to_dot(&self.initial_marking, &self.final_marking)
    }
}

pub fn to_json_string<T>(value: &T) -> Result<String, IoError>
where
    T: Serialize,
{
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn from_json_str<T>(s: &str) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    Ok(serde_json::from_str(s)?)
}

pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<(), IoError> {
    fs::write(path, to_json_string(value)?)?;
    Ok(())
}

pub fn read_json<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T, IoError> {
    let content = fs::read_to_string(path)?;
    from_json_str(&content)
}

pub fn to_ron_string<T>(value: &T) -> Result<String, IoError>
where
    T: Serialize,
{
    let pretty = PrettyConfig::default().new_line("\n".to_string());
    Ok(ron::ser::to_string_pretty(value, pretty)?)
}

pub fn from_ron_str<T>(s: &str) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    Ok(ron::from_str(s)?)
}

pub fn write_ron<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<(), IoError> {
    fs::write(path, to_ron_string(value)?)?;
    Ok(())
}

pub fn read_ron<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T, IoError> {
    let content = fs::read_to_string(path)?;
    from_ron_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::structure::{Place, Transition};

    fn sample() -> AcceptingNet {
        let mut net = Net::named("sample");
        let p = net.add_place(Place::plain("p")).unwrap();
        let q = net.add_place(Place::plain("q")).unwrap();
        let t = net.add_transition(Transition::labelled("t", "A")).unwrap();
        net.add_input_arc(p, t).unwrap();
        net.add_output_arc(t, q).unwrap();
        net.add_reset_arc(q, t).unwrap();
        AcceptingNet::new(net, [(p, 1)].into_iter().collect(), [(q, 1)].into_iter().collect())
    }

    #[test]
    fn json_keeps_names_markings_and_arcs() {
        let original = sample();
        let decoded = AcceptingNet::from_json(&original.to_json().unwrap()).unwrap();

        let p = decoded.net.place_by_name("p").unwrap();
        let t = decoded.net.transition_by_name("t").unwrap();
        assert_eq!(decoded.initial_marking.tokens(p), 1);
        assert_eq!(decoded.net.arcs_len(), 3);
        assert_eq!(decoded.net.reset_pre_set(t).len(), 1);
        assert_eq!(
            decoded.final_marking.to_sorted_string(&decoded.net),
            "[q:1]"
        );
    }

    #[test]
    fn ron_round_trip_preserves_labels() {
        let original = sample();
        let decoded = AcceptingNet::from_ron(&original.to_ron().unwrap()).unwrap();
        let t = decoded.net.transition_by_name("t").unwrap();
        assert_eq!(
            decoded.net.transition(t).and_then(|t| t.label.as_deref()),
            Some("A")
        );
    }

    #[test]
    fn malformed_ron_is_an_error_not_a_panic() {
        assert!(matches!(
            from_ron_str::<AcceptingNet>("(net: oops"),
            Err(IoError::RonParse(_))
        ));
    }
}
