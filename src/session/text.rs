/// Buffers streamed text fragments until a frame marks the reply complete
#[derive(Debug, Default)]
pub struct TextAccumulator {
    buffer: String,
}

impl TextAccumulator {
    /// Append a fragment; returns the full reply when `done` is set
    pub fn push(&mut self, fragment: &str, done: bool) -> Option<String> {
        self.buffer.push_str(fragment);
        if done {
            Some(std::mem::take(&mut self.buffer))
        } else {
            None
        }
    }

    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Drop any partial reply
    pub fn discard(&mut self) {
        self.buffer.clear();
    }
}
