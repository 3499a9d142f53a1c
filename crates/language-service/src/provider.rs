use anyhow::Result;
use async_trait::async_trait;
use lsp_types::{
    CodeAction, CompletionList, Diagnostic, DocumentSymbol, Hover, Location, LocationLink,
    Position, Range, WorkspaceEdit,
};

use crate::cancellation::CancellationToken;
use crate::documents::ServiceDocument;

/// One per-notation analysis engine.
///
/// Every method runs against a single-notation document (a virtual code, or
/// the source script itself when no generator accepted it) and must be
/// idempotent and side-effect-free with respect to the engine's state.
/// Returning `Ok(None)` means "no result here"; an `Err` is caught by the
/// fan-out, logged with the provider identity, and treated as no result —
/// sibling providers and sibling virtual documents still run.
///
/// The default for every feature is "not supported"; providers override what
/// they implement.
#[async_trait]
pub trait ServiceProvider: Send + Sync {
    /// Stable identity used in log messages and completion-item payloads.
    fn name(&self) -> &str;

    async fn hover(
        &self,
        document: &ServiceDocument,
        position: Position,
        token: &CancellationToken,
    ) -> Result<Option<Hover>> {
        let _ = (document, position, token);
        Ok(None)
    }

    async fn completion(
        &self,
        document: &ServiceDocument,
        position: Position,
        token: &CancellationToken,
    ) -> Result<Option<CompletionList>> {
        let _ = (document, position, token);
        Ok(None)
    }

    async fn definition(
        &self,
        document: &ServiceDocument,
        position: Position,
        token: &CancellationToken,
    ) -> Result<Option<Vec<LocationLink>>> {
        let _ = (document, position, token);
        Ok(None)
    }

    async fn references(
        &self,
        document: &ServiceDocument,
        position: Position,
        token: &CancellationToken,
    ) -> Result<Option<Vec<Location>>> {
        let _ = (document, position, token);
        Ok(None)
    }

    async fn rename_edits(
        &self,
        document: &ServiceDocument,
        position: Position,
        new_name: &str,
        token: &CancellationToken,
    ) -> Result<Option<WorkspaceEdit>> {
        let _ = (document, position, new_name, token);
        Ok(None)
    }

    async fn diagnostics(
        &self,
        document: &ServiceDocument,
        token: &CancellationToken,
    ) -> Result<Option<Vec<Diagnostic>>> {
        let _ = (document, token);
        Ok(None)
    }

    async fn document_symbols(
        &self,
        document: &ServiceDocument,
        token: &CancellationToken,
    ) -> Result<Option<Vec<DocumentSymbol>>> {
        let _ = (document, token);
        Ok(None)
    }

    async fn code_actions(
        &self,
        document: &ServiceDocument,
        range: Range,
        token: &CancellationToken,
    ) -> Result<Option<Vec<CodeAction>>> {
        let _ = (document, range, token);
        Ok(None)
    }
}
