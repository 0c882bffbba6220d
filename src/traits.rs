use crate::Settings;

/// Trait for a per-line filter operation (`comment`, `uncomment`, `htitle`).
pub trait LineOperation {
    /// Transforms a single line according to the resolved settings.
    ///
    /// # Arguments
    /// * `line`: The raw line bytes, without the terminator. Input is not
    ///   required to be valid UTF-8.
    /// * `settings`: The settings resolved for this invocation.
    ///
    /// # Returns
    /// The transformed line, also without a terminator. Exactly one output line
    /// is produced for every input line.
    fn apply(&self, line: &[u8], settings: &Settings) -> Vec<u8>;
}
