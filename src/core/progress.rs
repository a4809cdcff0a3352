// Progress reporting shared by both decoders

use std::sync::Mutex;

/// Callback signature: (percent 0..=100, status message).
pub type ProgressFn<'a> = dyn FnMut(u8, &str) + Send + 'a;

/// Serializes progress updates before they reach the caller's callback.
///
/// Channel decode tasks complete in arbitrary order, so percentages arriving
/// here are a monotonically-increasing-ish hint, not a strict sequence. The
/// mutex keeps the callback single-threaded; repeats of the last percentage
/// are dropped to bound the cadence.
pub struct ProgressSink<'a> {
    inner: Option<Mutex<SinkState<'a>>>,
}

struct SinkState<'a> {
    callback: Box<ProgressFn<'a>>,
    last_percent: Option<u8>,
}

impl<'a> ProgressSink<'a> {
    pub fn new(callback: impl FnMut(u8, &str) + Send + 'a) -> Self {
        Self {
            inner: Some(Mutex::new(SinkState {
                callback: Box::new(callback),
                last_percent: None,
            })),
        }
    }

    /// A sink that swallows every update.
    pub fn ignore() -> Self {
        Self { inner: None }
    }

    pub fn emit(&self, percent: u8, message: &str) {
        if let Some(inner) = &self.inner {
            let mut state = inner.lock().unwrap();
            if state.last_percent == Some(percent) {
                return;
            }
            state.last_percent = Some(percent);
            (state.callback)(percent, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_percent_suppressed() {
        let seen = Mutex::new(Vec::new());
        let sink = ProgressSink::new(|pct, msg: &str| {
            seen.lock().unwrap().push((pct, msg.to_string()));
        });

        sink.emit(5, "a");
        sink.emit(5, "b");
        sink.emit(6, "c");
        sink.emit(5, "d");
        drop(sink);

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], (5, "a".to_string()));
        assert_eq!(seen[1], (6, "c".to_string()));
        assert_eq!(seen[2], (5, "d".to_string()));
    }

    #[test]
    fn test_ignore_sink_is_silent() {
        let sink = ProgressSink::ignore();
        sink.emit(50, "nothing happens");
    }
}
