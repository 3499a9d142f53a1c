use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use lsp_types::{
    CompletionItem, CompletionList, CompletionTextEdit, Diagnostic, Hover, HoverContents,
    LocationLink, MarkedString, Position, Range, TextEdit, WorkspaceEdit,
};
use url::Url;
use weft_language_core::{
    CodeInformation, CodeMapping, LanguagePlugin, LinkedCodeCapabilities, Mapping, ScriptRegistry,
    Snapshot, Verification, VirtualCode,
};
use weft_language_service::{
    CancellationToken, LanguageService, ServiceDocument, ServiceProvider,
};

fn doc_url(name: &str) -> Url {
    Url::parse(&format!("file:///{name}")).unwrap()
}

fn identity_mapping(length: usize, data: CodeInformation) -> CodeMapping {
    Mapping {
        source: None,
        source_offsets: vec![0],
        generated_offsets: vec![0],
        lengths: vec![length],
        generated_lengths: None,
        data,
    }
}

fn region_mapping(source_start: usize, length: usize, data: CodeInformation) -> CodeMapping {
    Mapping {
        source: None,
        source_offsets: vec![source_start],
        generated_offsets: vec![0],
        lengths: vec![length],
        generated_lengths: None,
        data,
    }
}

fn word_at(text: &str, offset: usize) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    if offset >= bytes.len() || !bytes[offset].is_ascii_alphanumeric() {
        return None;
    }
    let start = text[..offset]
        .rfind(|c: char| !c.is_ascii_alphanumeric())
        .map(|i| i + 1)
        .unwrap_or(0);
    let end = text[offset..]
        .find(|c: char| !c.is_ascii_alphanumeric())
        .map(|i| i + offset)
        .unwrap_or(text.len());
    Some((start, end))
}

/// Generates two sibling virtual codes that both project the whole script,
/// the way a template compiler derives several single-notation views of one
/// document.
struct DualViewPlugin;

impl LanguagePlugin for DualViewPlugin {
    fn name(&self) -> &str {
        "dual-view"
    }

    fn language_id(&self, script_id: &Url) -> Option<String> {
        script_id.path().ends_with(".tpl").then(|| "tpl".to_string())
    }

    fn create_virtual_code(
        &self,
        _script_id: &Url,
        language_id: &str,
        snapshot: &Snapshot,
    ) -> anyhow::Result<Option<VirtualCode>> {
        if language_id != "tpl" {
            return Ok(None);
        }
        let mut root = VirtualCode::new(
            "root",
            "tpl",
            Snapshot::new(snapshot.text().to_string()),
            vec![identity_mapping(snapshot.len(), CodeInformation::everything())],
        );
        for (id, language) in [("one", "alpha"), ("two", "beta")] {
            root.embedded_codes.push(VirtualCode::new(
                id,
                language,
                Snapshot::new(snapshot.text().to_string()),
                vec![identity_mapping(snapshot.len(), CodeInformation::everything())],
            ));
        }
        Ok(Some(root))
    }
}

/// Extracts the text between `<script>` and `</script>` into a `js` virtual
/// code; the rest of the document is not mapped.
struct ScriptRegionPlugin {
    verification: fn() -> Verification,
}

impl ScriptRegionPlugin {
    fn reporting() -> Self {
        Self {
            verification: || Verification::Yes,
        }
    }

    fn silenced() -> Self {
        Self {
            verification: || Verification::Filtered {
                should_report: Arc::new(|| false),
            },
        }
    }
}

impl LanguagePlugin for ScriptRegionPlugin {
    fn name(&self) -> &str {
        "script-region"
    }

    fn language_id(&self, script_id: &Url) -> Option<String> {
        script_id.path().ends_with(".tpl").then(|| "tpl".to_string())
    }

    fn create_virtual_code(
        &self,
        _script_id: &Url,
        language_id: &str,
        snapshot: &Snapshot,
    ) -> anyhow::Result<Option<VirtualCode>> {
        if language_id != "tpl" {
            return Ok(None);
        }
        let text = snapshot.text();
        let Some(open) = text.find("<script>") else {
            return Ok(None);
        };
        let start = open + "<script>".len();
        let Some(end) = text[start..].find("</script>").map(|i| i + start) else {
            return Ok(None);
        };

        let mut root = VirtualCode::new("root", "html", Snapshot::new(text.to_string()), vec![
            identity_mapping(snapshot.len(), CodeInformation {
                verification: Verification::No,
                ..CodeInformation::everything()
            }),
        ]);
        let data = CodeInformation {
            verification: (self.verification)(),
            ..CodeInformation::everything()
        };
        root.embedded_codes.push(VirtualCode::new(
            "script",
            "js",
            Snapshot::new(text[start..end].to_string()),
            vec![region_mapping(start, end - start, data)],
        ));
        Ok(Some(root))
    }
}

/// One virtual code projecting the whole document, with a linked mapping
/// aliasing two equal-length ranges.
struct LinkedPlugin {
    link_from: usize,
    link_to: usize,
    link_len: usize,
    to_side: LinkedCodeCapabilities,
}

impl LanguagePlugin for LinkedPlugin {
    fn name(&self) -> &str {
        "linked"
    }

    fn language_id(&self, script_id: &Url) -> Option<String> {
        script_id.path().ends_with(".tpl").then(|| "tpl".to_string())
    }

    fn create_virtual_code(
        &self,
        _script_id: &Url,
        language_id: &str,
        snapshot: &Snapshot,
    ) -> anyhow::Result<Option<VirtualCode>> {
        if language_id != "tpl" {
            return Ok(None);
        }
        let mut code = VirtualCode::new(
            "mirror",
            "js",
            Snapshot::new(snapshot.text().to_string()),
            vec![identity_mapping(snapshot.len(), CodeInformation::everything())],
        );
        code.linked_code_mappings = vec![Mapping {
            source: None,
            source_offsets: vec![self.link_from],
            generated_offsets: vec![self.link_to],
            lengths: vec![self.link_len],
            generated_lengths: None,
            data: (LinkedCodeCapabilities::all(), self.to_side),
        }];
        Ok(Some(code))
    }
}

/// Hover provider answering with the document's language id, for languages in
/// its allow list.
struct EchoHoverProvider {
    languages: &'static [&'static str],
}

#[async_trait]
impl ServiceProvider for EchoHoverProvider {
    fn name(&self) -> &str {
        "echo-hover"
    }

    async fn hover(
        &self,
        document: &ServiceDocument,
        _position: Position,
        _token: &CancellationToken,
    ) -> anyhow::Result<Option<Hover>> {
        if !self.languages.contains(&document.language_id.as_str()) {
            return Ok(None);
        }
        Ok(Some(Hover {
            contents: HoverContents::Scalar(MarkedString::String(format!(
                "hover from {}",
                document.language_id
            ))),
            range: None,
        }))
    }
}

struct FailingProvider;

#[async_trait]
impl ServiceProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn hover(
        &self,
        _document: &ServiceDocument,
        _position: Position,
        _token: &CancellationToken,
    ) -> anyhow::Result<Option<Hover>> {
        Err(anyhow!("engine crashed"))
    }

    async fn diagnostics(
        &self,
        _document: &ServiceDocument,
        _token: &CancellationToken,
    ) -> anyhow::Result<Option<Vec<Diagnostic>>> {
        Err(anyhow!("engine crashed"))
    }
}

/// Completion provider yielding one shared item (identical everywhere) and
/// one item naming the document's language.
struct ListCompletionProvider;

#[async_trait]
impl ServiceProvider for ListCompletionProvider {
    fn name(&self) -> &str {
        "list-completion"
    }

    async fn completion(
        &self,
        document: &ServiceDocument,
        position: Position,
        _token: &CancellationToken,
    ) -> anyhow::Result<Option<CompletionList>> {
        if document.language_id == "tpl" {
            return Ok(None);
        }
        let edit = |text: &str| {
            Some(CompletionTextEdit::Edit(TextEdit {
                range: Range::new(position, position),
                new_text: text.to_string(),
            }))
        };
        Ok(Some(CompletionList {
            is_incomplete: false,
            items: vec![
                CompletionItem {
                    label: "shared".to_string(),
                    text_edit: edit("shared"),
                    ..Default::default()
                },
                CompletionItem {
                    label: document.language_id.clone(),
                    text_edit: edit(document.language_id.as_str()),
                    ..Default::default()
                },
            ],
        }))
    }
}

/// Diagnoses `js` documents with one error spanning the whole document.
struct JsDiagProvider;

#[async_trait]
impl ServiceProvider for JsDiagProvider {
    fn name(&self) -> &str {
        "js-diag"
    }

    async fn diagnostics(
        &self,
        document: &ServiceDocument,
        _token: &CancellationToken,
    ) -> anyhow::Result<Option<Vec<Diagnostic>>> {
        if document.language_id != "js" {
            return Ok(None);
        }
        let end = document.position_at(document.text().len());
        Ok(Some(vec![Diagnostic {
            range: Range::new(Position::new(0, 0), end),
            message: "boom".to_string(),
            ..Default::default()
        }]))
    }
}

/// Renames exactly the word under the cursor; knows nothing about aliases.
struct WordRenameProvider;

#[async_trait]
impl ServiceProvider for WordRenameProvider {
    fn name(&self) -> &str {
        "word-rename"
    }

    async fn rename_edits(
        &self,
        document: &ServiceDocument,
        position: Position,
        new_name: &str,
        _token: &CancellationToken,
    ) -> anyhow::Result<Option<WorkspaceEdit>> {
        let Some((start, end)) = word_at(document.text(), document.offset_at(position)) else {
            return Ok(None);
        };
        let edit = TextEdit {
            range: Range::new(document.position_at(start), document.position_at(end)),
            new_text: new_name.to_string(),
        };
        Ok(Some(WorkspaceEdit {
            changes: Some([(document.uri.clone(), vec![edit])].into_iter().collect()),
            ..Default::default()
        }))
    }
}

/// Definition provider over the "foo bar foo def" fixture: `bar` resolves to
/// the first `foo`, any `foo` resolves to `def`.
struct ChainDefinitionProvider;

#[async_trait]
impl ServiceProvider for ChainDefinitionProvider {
    fn name(&self) -> &str {
        "chain-definition"
    }

    async fn definition(
        &self,
        document: &ServiceDocument,
        position: Position,
        _token: &CancellationToken,
    ) -> anyhow::Result<Option<Vec<LocationLink>>> {
        let offset = document.offset_at(position);
        let Some((start, end)) = word_at(document.text(), offset) else {
            return Ok(None);
        };
        let target = match &document.text()[start..end] {
            "bar" => document.text().find("foo"),
            "foo" => document.text().find("def"),
            _ => None,
        };
        let Some(target) = target else {
            return Ok(None);
        };
        let (target_start, target_end) = word_at(document.text(), target).unwrap();
        let target_range = Range::new(
            document.position_at(target_start),
            document.position_at(target_end),
        );
        Ok(Some(vec![LocationLink {
            origin_selection_range: None,
            target_uri: document.uri.clone(),
            target_range,
            target_selection_range: target_range,
        }]))
    }
}

fn service(
    plugins: Vec<Arc<dyn LanguagePlugin>>,
    providers: Vec<Arc<dyn ServiceProvider>>,
) -> LanguageService {
    LanguageService::new(ScriptRegistry::new(plugins), providers)
}

fn open(service: &LanguageService, name: &str, language: &str, text: &str) -> Url {
    let id = doc_url(name);
    service.update_script(id.clone(), language, Snapshot::new(text.to_string()));
    id
}

#[tokio::test]
async fn first_match_policy_takes_the_innermost_virtual_code() {
    let service = service(
        vec![Arc::new(DualViewPlugin)],
        vec![Arc::new(EchoHoverProvider {
            languages: &["alpha", "beta", "tpl"],
        })],
    );
    let id = open(&service, "a.tpl", "tpl", "hello world");

    let hover = service
        .hover(&id, Position::new(0, 2), &CancellationToken::new())
        .await
        .expect("some virtual code must answer");

    // Post-order: "one" (alpha) before "two" (beta) before the root.
    assert_eq!(
        hover.contents,
        HoverContents::Scalar(MarkedString::String("hover from alpha".to_string()))
    );
}

#[tokio::test]
async fn merge_all_policy_unions_and_dedupes_across_virtual_codes() {
    let service = service(
        vec![Arc::new(DualViewPlugin)],
        vec![Arc::new(ListCompletionProvider)],
    );
    let id = open(&service, "a.tpl", "tpl", "hello world");

    let list = service
        .completion(&id, Position::new(0, 2), &CancellationToken::new())
        .await
        .expect("both virtual codes must contribute");

    let mut labels: Vec<_> = list.items.iter().map(|item| item.label.clone()).collect();
    labels.sort();
    assert_eq!(
        labels,
        ["alpha", "beta", "shared"],
        "the shared item must collapse to one entry"
    );
}

#[tokio::test]
async fn provider_failure_does_not_abort_the_fan_out() {
    let service = service(
        vec![Arc::new(DualViewPlugin)],
        vec![
            Arc::new(FailingProvider),
            Arc::new(EchoHoverProvider {
                languages: &["alpha", "beta"],
            }),
        ],
    );
    let id = open(&service, "a.tpl", "tpl", "hello world");

    let hover = service
        .hover(&id, Position::new(0, 2), &CancellationToken::new())
        .await;
    assert!(hover.is_some(), "the sibling provider must still answer");
}

#[tokio::test]
async fn disabled_provider_is_skipped() {
    let service = service(
        vec![Arc::new(DualViewPlugin)],
        vec![Arc::new(EchoHoverProvider {
            languages: &["alpha", "beta"],
        })],
    );
    let id = open(&service, "a.tpl", "tpl", "hello world");

    service.set_provider_enabled("echo-hover", false);
    assert!(
        service
            .hover(&id, Position::new(0, 2), &CancellationToken::new())
            .await
            .is_none()
    );

    service.set_provider_enabled("echo-hover", true);
    assert!(
        service
            .hover(&id, Position::new(0, 2), &CancellationToken::new())
            .await
            .is_some()
    );
}

#[tokio::test]
async fn opaque_documents_run_providers_directly() {
    let service = service(
        Vec::new(),
        vec![Arc::new(EchoHoverProvider {
            languages: &["plaintext"],
        })],
    );
    let id = open(&service, "notes.txt", "plaintext", "just text");

    let hover = service
        .hover(&id, Position::new(0, 1), &CancellationToken::new())
        .await
        .expect("providers must run against the script itself");
    assert_eq!(
        hover.contents,
        HoverContents::Scalar(MarkedString::String("hover from plaintext".to_string()))
    );
}

#[tokio::test]
async fn cancelled_requests_produce_no_result() {
    let service = service(
        vec![Arc::new(DualViewPlugin)],
        vec![Arc::new(EchoHoverProvider {
            languages: &["alpha", "beta"],
        })],
    );
    let id = open(&service, "a.tpl", "tpl", "hello world");

    let token = CancellationToken::new();
    token.cancel();
    assert!(service.hover(&id, Position::new(0, 2), &token).await.is_none());
}

#[tokio::test]
async fn diagnostics_map_back_into_the_source_region() {
    let service = service(
        vec![Arc::new(ScriptRegionPlugin::reporting())],
        vec![Arc::new(JsDiagProvider)],
    );
    let text = "<p>ok</p><script>boom()</script>";
    let id = open(&service, "a.tpl", "tpl", text);

    let diagnostics = service.diagnostics(&id, &CancellationToken::new()).await;
    assert_eq!(diagnostics.len(), 1);

    let inner_start = text.find("boom()").unwrap() as u32;
    let inner_end = inner_start + "boom()".len() as u32;
    assert_eq!(
        diagnostics[0].range,
        Range::new(Position::new(0, inner_start), Position::new(0, inner_end))
    );
    assert_eq!(diagnostics[0].message, "boom");
}

#[tokio::test]
async fn should_report_gate_silences_mapped_back_diagnostics() {
    let service = service(
        vec![Arc::new(ScriptRegionPlugin::silenced())],
        vec![Arc::new(JsDiagProvider)],
    );
    let id = open(&service, "a.tpl", "tpl", "<p>ok</p><script>boom()</script>");

    let diagnostics = service.diagnostics(&id, &CancellationToken::new()).await;
    assert!(
        diagnostics.is_empty(),
        "reports through a declining gate must be dropped"
    );
}

#[tokio::test]
async fn provider_failures_leave_diagnostics_of_other_providers_intact() {
    let service = service(
        vec![Arc::new(ScriptRegionPlugin::reporting())],
        vec![Arc::new(FailingProvider), Arc::new(JsDiagProvider)],
    );
    let id = open(&service, "a.tpl", "tpl", "<p>ok</p><script>boom()</script>");

    let diagnostics = service.diagnostics(&id, &CancellationToken::new()).await;
    assert_eq!(diagnostics.len(), 1);
}

#[tokio::test]
async fn rename_propagates_through_linked_mappings() {
    // "foo" at 0 and at 8 are aliases; the provider only ever renames the
    // word under the cursor, so the second occurrence must come from the
    // linked-code expansion.
    let service = service(
        vec![Arc::new(LinkedPlugin {
            link_from: 0,
            link_to: 8,
            link_len: 3,
            to_side: LinkedCodeCapabilities::all(),
        })],
        vec![Arc::new(WordRenameProvider)],
    );
    let id = open(&service, "a.tpl", "tpl", "foo bar foo");

    let edit = service
        .rename(&id, Position::new(0, 1), "qux", &CancellationToken::new())
        .await
        .expect("rename must produce edits");

    let changes = edit.changes.unwrap();
    let edits = changes.get(&id).expect("edits must land in the source document");
    assert_eq!(edits.len(), 1, "the aliased occurrence replaces the original");
    assert_eq!(
        edits[0].range,
        Range::new(Position::new(0, 8), Position::new(0, 11))
    );
    assert_eq!(edits[0].new_text, "qux");
}

#[tokio::test]
async fn rename_does_not_follow_links_disabled_for_rename() {
    let service = service(
        vec![Arc::new(LinkedPlugin {
            link_from: 0,
            link_to: 8,
            link_len: 3,
            to_side: LinkedCodeCapabilities {
                references: true,
                definitions: true,
                rename: false,
            },
        })],
        vec![Arc::new(WordRenameProvider)],
    );
    let id = open(&service, "a.tpl", "tpl", "foo bar foo");

    let edit = service
        .rename(&id, Position::new(0, 1), "qux", &CancellationToken::new())
        .await
        .expect("rename must produce edits");

    let changes = edit.changes.unwrap();
    let edits = changes.get(&id).unwrap();
    assert_eq!(edits.len(), 1);
    assert_eq!(
        edits[0].range,
        Range::new(Position::new(0, 0), Position::new(0, 3)),
        "with the link closed, only the queried occurrence is renamed"
    );
}

#[tokio::test]
async fn definition_chains_through_linked_positions() {
    // bar -> first foo; foo aliases at 8; foo -> def. The reported
    // definition must be the final hop, not the intermediate alias.
    let service = service(
        vec![Arc::new(LinkedPlugin {
            link_from: 0,
            link_to: 8,
            link_len: 3,
            to_side: LinkedCodeCapabilities::all(),
        })],
        vec![Arc::new(ChainDefinitionProvider)],
    );
    let id = open(&service, "a.tpl", "tpl", "foo bar foo def");

    let links = service
        .definition(&id, Position::new(0, 5), &CancellationToken::new())
        .await
        .expect("definition must resolve");

    assert_eq!(links.len(), 1);
    assert_eq!(links[0].target_uri, id);
    assert_eq!(
        links[0].target_range,
        Range::new(Position::new(0, 12), Position::new(0, 15))
    );
}

#[tokio::test(start_paused = true)]
async fn superseded_validation_pass_stops_early() {
    let service = Arc::new(service(
        vec![Arc::new(ScriptRegionPlugin::reporting())],
        vec![Arc::new(JsDiagProvider)],
    ));
    let a = open(&service, "a.tpl", "tpl", "<script>a()</script>");
    let b = open(&service, "b.tpl", "tpl", "<script>b()</script>");

    let mut published = Vec::new();
    let validate = {
        let service = service.clone();
        let ids = vec![a.clone(), b.clone()];
        async move {
            service
                .validate_scripts(
                    &ids,
                    Duration::from_millis(50),
                    &CancellationToken::new(),
                    |uri, _| published.push(uri),
                )
                .await;
            published
        }
    };
    let edit = {
        let service = service.clone();
        let a = a.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            service.update_script(a, "tpl", Snapshot::new("<script>changed()</script>"));
        }
    };

    let (published, ()) = tokio::join!(validate, edit);
    assert_eq!(
        published,
        vec![a],
        "the pass must stop once the edit bumps the revision"
    );
}

#[tokio::test]
async fn completed_validation_pass_publishes_everything() {
    let service = service(
        vec![Arc::new(ScriptRegionPlugin::reporting())],
        vec![Arc::new(JsDiagProvider)],
    );
    let a = open(&service, "a.tpl", "tpl", "<script>a()</script>");
    let b = open(&service, "b.tpl", "tpl", "<script>b()</script>");

    let mut published = Vec::new();
    let completed = service
        .validate_scripts(
            &[a.clone(), b.clone()],
            Duration::from_millis(1),
            &CancellationToken::new(),
            |uri, diagnostics| published.push((uri, diagnostics.len())),
        )
        .await;

    assert!(completed);
    assert_eq!(published, vec![(a, 1), (b, 1)]);
}
