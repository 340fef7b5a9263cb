//! Document scanner state machine definitions.
//!
//! One state per byte-level parsing context. The scanner loop owns all
//! transitions; several of them re-examine the current byte after a state
//! change, which is why the loop advances the cursor per-state instead of
//! per-iteration.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum State {
    /// Before the first byte has been classified.
    ParseStart,
    /// Just after `<`.
    TagBegin,
    /// `<!…` declarations.
    SgmlTag,
    /// `<?…` processing instructions.
    XmlTag,
    /// `…?` seen inside an XML PI, expecting `>`.
    XmlTagEnd,
    /// `<![…]…>` bracket-balanced sections.
    CompoundTag,
    /// `<!--` prologue.
    CommentTag,
    /// Inside a comment, scanning for `-->`.
    CommentContent,
    /// Unrecognized `<!…` content, skipped to `>`.
    SgmlContent,
    /// Inside `<…>`, feeding the tag-content sub-machine.
    TagContent,
    /// Token finished; commit it and pick the next content mode.
    TagEnd,
    /// Emitting character content.
    ContentWrite,
    /// Collapsing a whitespace run.
    ContentIgnoreSp,
    /// Discarding content up to the next `<`.
    ContentIgnore,
    /// Inside a `<style>` body.
    ContentStyle,
}
