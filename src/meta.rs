use crate::{ModelRef, Node, Result, ScopedViewContext, Value};

/// Produces and consumes the value of a meta node.
///
/// Meta nodes carry information about the model rather than an attribute of
/// it, such as a version stamp or a link. Generation asks the handler for a
/// value and writes a `META` event; application hands the incoming value back.
pub trait MetaHandler: Send + Sync {
    fn produce(&self, node: &Node, model: &ModelRef, scope: &ScopedViewContext<'_>) -> Result<Value>;

    /// Receives the value read from the view. Ignored by default.
    fn consume(
        &self,
        node: &Node,
        model: &ModelRef,
        value: Value,
        scope: &ScopedViewContext<'_>,
    ) -> Result<()> {
        let _ = (node, model, value, scope);
        Ok(())
    }
}
