//! Host-to-tracker signals
//!
//! Route changes and DOM interaction signals expressed as data, so a host
//! (a page runtime through the C ABI, or a recorded NDJSON stream) can drive
//! the tracker without a browser.

use crate::element::Element;
use crate::error::TrackerError;
use crate::scroll::ScrollGeometry;
use serde::{Deserialize, Serialize};

/// A single signal from the host page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Signal {
    /// The active route changed
    Navigate { path: String },
    /// A click bubbled to the document; `chain` starts at the clicked element
    Click {
        #[serde(default)]
        chain: Vec<Element>,
    },
    /// The pointer entered an element
    PointerEnter {
        #[serde(default)]
        chain: Vec<Element>,
    },
    /// The pointer left the element it was over
    PointerLeave,
    /// The document scrolled
    Scroll {
        scroll_top: f64,
        scroll_height: f64,
        viewport_height: f64,
    },
    /// The page or tab is being unloaded
    Unload,
    /// No interaction; lets due timers fire
    Tick,
}

impl Signal {
    /// Scroll geometry carried by a `Scroll` signal
    pub fn scroll_geometry(&self) -> Option<ScrollGeometry> {
        match *self {
            Signal::Scroll {
                scroll_top,
                scroll_height,
                viewport_height,
            } => Some(ScrollGeometry {
                scroll_top,
                scroll_height,
                viewport_height,
            }),
            _ => None,
        }
    }
}

/// A signal stamped with the time it was observed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedSignal {
    /// Milliseconds since the Unix epoch (or since the start of a recording)
    pub at_ms: i64,
    #[serde(flatten)]
    pub signal: Signal,
}

/// Parse newline-delimited timed signals, skipping blank lines
pub fn parse_signal_ndjson(ndjson: &str) -> Result<Vec<TimedSignal>, TrackerError> {
    let mut signals = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<TimedSignal>(trimmed) {
            Ok(signal) => signals.push(signal),
            Err(e) => {
                return Err(TrackerError::ParseError(format!(
                    "Failed to parse line {}: {}",
                    line_num + 1,
                    e
                )));
            }
        }
    }
    Ok(signals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_signal_variants() {
        let ndjson = r##"
            {"at_ms": 0, "signal": "navigate", "path": "#/"}
            {"at_ms": 500, "signal": "click", "chain": [{"tag": "button", "id": "shop-button"}]}

            {"at_ms": 900, "signal": "pointer_leave"}
            {"at_ms": 1000, "signal": "scroll", "scroll_top": 1200, "scroll_height": 3000, "viewport_height": 1000}
            {"at_ms": 4000, "signal": "unload"}
        "##;

        let signals = parse_signal_ndjson(ndjson).unwrap();
        assert_eq!(signals.len(), 5);
        assert_eq!(
            signals[0].signal,
            Signal::Navigate {
                path: "#/".to_string()
            }
        );
        match &signals[1].signal {
            Signal::Click { chain } => assert_eq!(chain[0].id.as_deref(), Some("shop-button")),
            other => panic!("unexpected signal {:?}", other),
        }
        assert_eq!(signals[2].signal, Signal::PointerLeave);
        assert_eq!(
            signals[3].signal.scroll_geometry().and_then(|g| g.percent()),
            Some(60)
        );
        assert_eq!(signals[4].at_ms, 4000);
    }

    #[test]
    fn test_click_without_chain_defaults_to_empty() {
        let signals = parse_signal_ndjson(r#"{"at_ms": 1, "signal": "click"}"#).unwrap();
        assert_eq!(signals[0].signal, Signal::Click { chain: vec![] });
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = parse_signal_ndjson("{\"at_ms\": 1, \"signal\": \"tick\"}\n{\"at_ms\": 2, \"signal\": \"teleport\"}")
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
