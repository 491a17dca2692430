use super::*;
use crate::core::completion::testing::{ScriptedProvider, ScriptedReply};
use crate::core::message::MessageRole;
use std::path::Path;
use tempfile::TempDir;

const MODEL: &str = "test-model";

async fn run_template(
    source: &str,
    ctx: &RunContext,
    resolver: &mut ScriptedResolver,
    provider: &ScriptedProvider,
) -> (Result<crate::core::message::Chat, TemplateRunError>, String) {
    let template = Template::new("fixture", source, MODEL);
    let mut out = Vec::new();
    let result = template.run(ctx, resolver, provider, &mut out).await;
    (result, String::from_utf8(out).unwrap())
}

fn roles_and_contents(chat: &crate::core::message::Chat) -> Vec<(MessageRole, &str)> {
    chat.messages()
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect()
}

#[tokio::test]
async fn runs_system_user_assistant_conversation() {
    let provider = ScriptedProvider::new(vec![ScriptedReply::ok(&["Hel", "lo"])]);
    let mut resolver = ScriptedResolver::new().answer("name", "Bob");
    let source = "{{ system() }}Be brief.\n---\n{{ user() }}Hi {{ name }}\n---\n{{ assistant() }}";

    let (result, out) = run_template(source, &RunContext::default(), &mut resolver, &provider).await;
    let chat = result.unwrap();

    assert_eq!(
        roles_and_contents(&chat),
        vec![
            (MessageRole::System, "Be brief."),
            (MessageRole::User, "Hi Bob"),
            (MessageRole::Assistant, "Hello"),
        ]
    );
    assert_eq!(
        out,
        "\n--- system ---\n\nBe brief.\n\n--- user ---\n\nHi Bob\n\n--- assistant ---\n\nHello\n"
    );

    let requests = provider.recorded_requests();
    assert_eq!(requests.len(), 1);
    let (model, messages) = &requests[0];
    assert_eq!(model, MODEL);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, "system");
    assert_eq!(messages[1].role, "user");
    assert_eq!(messages[1].content, "Hi Bob");
}

#[tokio::test]
async fn directive_free_sections_append_one_message_each() {
    let provider = ScriptedProvider::new(Vec::new());
    let mut resolver = ScriptedResolver::new();
    let source = "first---second---third";

    let (result, _) = run_template(source, &RunContext::default(), &mut resolver, &provider).await;
    let chat = result.unwrap();

    assert_eq!(
        roles_and_contents(&chat),
        vec![
            (MessageRole::System, "first"),
            (MessageRole::System, "second"),
            (MessageRole::System, "third"),
        ]
    );
    assert!(provider.recorded_requests().is_empty());
}

#[tokio::test]
async fn active_role_persists_into_later_sections() {
    let provider = ScriptedProvider::new(Vec::new());
    let mut resolver = ScriptedResolver::new();

    let (result, _) = run_template(
        "{{ user() }}question one---question two",
        &RunContext::default(),
        &mut resolver,
        &provider,
    )
    .await;
    let chat = result.unwrap();

    assert_eq!(
        roles_and_contents(&chat),
        vec![
            (MessageRole::User, "question one"),
            (MessageRole::User, "question two"),
        ]
    );
}

#[tokio::test]
async fn repeated_directives_append_nothing_by_themselves() {
    let provider = ScriptedProvider::new(Vec::new());
    let mut resolver = ScriptedResolver::new();

    let (result, out) = run_template(
        "{{ user() }}{{ user() }}\n---\nhello",
        &RunContext::default(),
        &mut resolver,
        &provider,
    )
    .await;
    let chat = result.unwrap();

    assert_eq!(roles_and_contents(&chat), vec![(MessageRole::User, "hello")]);
    assert_eq!(out.matches("--- user ---").count(), 2);
}

#[tokio::test]
async fn context_and_inputs_are_bound_not_prompted() {
    let provider = ScriptedProvider::new(Vec::new());
    let mut resolver = ScriptedResolver::new().answer("task", "review");
    let ctx = RunContext::new(
        vec![
            ContextFile::new("a.rs", "fn a() {}"),
            ContextFile::new("b.rs", "fn b() {}"),
        ],
        vec!["one".to_string(), "two".to_string()],
    );
    let source = "{{ task }}:{% for f in context %} {{ f.filename }}={{ f.content }}{% endfor %} \
                  [{{ inputs | join(',') }}] {{ context | length }}";

    let (result, _) = run_template(source, &ctx, &mut resolver, &provider).await;
    let chat = result.unwrap();

    assert_eq!(resolver.asked(), ["task"]);
    assert_eq!(
        chat.messages()[0].content,
        "review: a.rs=fn a() {} b.rs=fn b() {} [one,two] 2"
    );
}

#[tokio::test]
async fn variables_are_asked_again_in_each_section() {
    let provider = ScriptedProvider::new(Vec::new());
    let mut resolver = ScriptedResolver::new()
        .answer("topic", "first")
        .answer("topic", "second");

    let (result, _) = run_template(
        "{{ topic }}---{{ topic }} and {{ topic }}",
        &RunContext::default(),
        &mut resolver,
        &provider,
    )
    .await;
    let chat = result.unwrap();

    assert_eq!(resolver.asked(), ["topic", "topic"]);
    assert_eq!(chat.messages()[0].content, "first");
    assert_eq!(chat.messages()[1].content, "second and second");
}

#[tokio::test]
async fn each_assistant_call_streams_its_own_completion() {
    let provider = ScriptedProvider::new(vec![
        ScriptedReply::ok(&["A"]),
        ScriptedReply::ok(&["B"]),
    ]);
    let mut resolver = ScriptedResolver::new();

    let (result, out) = run_template(
        "{{ user() }}go---{{ assistant() }} / {{ assistant() }}",
        &RunContext::default(),
        &mut resolver,
        &provider,
    )
    .await;
    let chat = result.unwrap();

    assert_eq!(
        roles_and_contents(&chat),
        vec![(MessageRole::User, "go"), (MessageRole::Assistant, "A / B")]
    );
    assert_eq!(provider.recorded_requests().len(), 2);
    // Assistant text is streamed once, never echoed again at append time.
    assert_eq!(out.matches('A').count(), 1);
}

#[tokio::test]
async fn directives_in_untaken_branches_never_fire() {
    let provider = ScriptedProvider::new(Vec::new());
    let mut resolver = ScriptedResolver::new();

    let (result, out) = run_template(
        "{{ user() }}hi---{% if false %}{{ assistant() }}{% endif %}after",
        &RunContext::default(),
        &mut resolver,
        &provider,
    )
    .await;
    let chat = result.unwrap();

    assert_eq!(
        roles_and_contents(&chat),
        vec![(MessageRole::User, "hi"), (MessageRole::User, "after")]
    );
    assert!(!out.contains("--- assistant ---"));
    assert!(provider.recorded_requests().is_empty());
}

#[tokio::test]
async fn commented_out_directives_never_fire() {
    let provider = ScriptedProvider::new(Vec::new());
    let mut resolver = ScriptedResolver::new();

    let (result, _) = run_template(
        "{{ user() }}hi---{# {{ assistant() }} #}note",
        &RunContext::default(),
        &mut resolver,
        &provider,
    )
    .await;
    let chat = result.unwrap();

    assert_eq!(
        roles_and_contents(&chat),
        vec![(MessageRole::User, "hi"), (MessageRole::User, "note")]
    );
    assert!(provider.recorded_requests().is_empty());
}

#[tokio::test]
async fn filtered_assistant_call_completes_and_switches_role() {
    let provider = ScriptedProvider::new(vec![ScriptedReply::ok(&["o", "k"])]);
    let mut resolver = ScriptedResolver::new();

    let (result, out) = run_template(
        "{{ user() }}hi---{{ assistant() | upper }}",
        &RunContext::default(),
        &mut resolver,
        &provider,
    )
    .await;
    let chat = result.unwrap();

    assert_eq!(
        roles_and_contents(&chat),
        vec![(MessageRole::User, "hi"), (MessageRole::Assistant, "OK")]
    );
    assert!(out.ends_with("--- assistant ---\n\nok\n"));
    assert!(resolver.asked().is_empty());
}

#[tokio::test]
async fn completion_can_be_captured_with_set() {
    let provider = ScriptedProvider::new(vec![ScriptedReply::ok(&["draft"])]);
    let mut resolver = ScriptedResolver::new();

    let (result, _) = run_template(
        "{{ user() }}hi---{% set reply = assistant() %}[{{ reply }}]",
        &RunContext::default(),
        &mut resolver,
        &provider,
    )
    .await;
    let chat = result.unwrap();

    assert_eq!(chat.messages()[1].role, MessageRole::Assistant);
    assert_eq!(chat.messages()[1].content, "[draft]");
    assert!(resolver.asked().is_empty());
}

#[tokio::test]
async fn assistant_in_a_loop_requests_a_completion_per_iteration() {
    let provider = ScriptedProvider::new(vec![
        ScriptedReply::ok(&["A"]),
        ScriptedReply::ok(&["B"]),
    ]);
    let mut resolver = ScriptedResolver::new();

    let (result, out) = run_template(
        "{{ user() }}go---{% for _ in range(2) %}{{ assistant() }}{% endfor %}",
        &RunContext::default(),
        &mut resolver,
        &provider,
    )
    .await;
    let chat = result.unwrap();

    assert_eq!(
        roles_and_contents(&chat),
        vec![(MessageRole::User, "go"), (MessageRole::Assistant, "AB")]
    );
    assert_eq!(out.matches("--- assistant ---").count(), 2);
    let requests = provider.recorded_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].1.len(), 1);
    assert_eq!(requests[1].1.len(), 1);
}

#[tokio::test]
async fn directive_only_sections_inside_blocks_append_nothing() {
    let provider = ScriptedProvider::new(Vec::new());
    let mut resolver = ScriptedResolver::new();

    let (result, _) = run_template(
        "{% if true %}{{ user() }}{% endif %}\n---\nq",
        &RunContext::default(),
        &mut resolver,
        &provider,
    )
    .await;
    let chat = result.unwrap();

    assert_eq!(roles_and_contents(&chat), vec![(MessageRole::User, "q")]);
}

#[tokio::test]
async fn blank_sections_without_directives_are_kept() {
    let provider = ScriptedProvider::new(Vec::new());
    let mut resolver = ScriptedResolver::new();

    let (result, _) = run_template(
        "a---   ---b",
        &RunContext::default(),
        &mut resolver,
        &provider,
    )
    .await;
    let chat = result.unwrap();

    assert_eq!(
        roles_and_contents(&chat),
        vec![
            (MessageRole::System, "a"),
            (MessageRole::System, ""),
            (MessageRole::System, "b"),
        ]
    );
}

#[tokio::test]
async fn assistant_followed_by_user_directive_tags_section_as_user() {
    let provider = ScriptedProvider::new(vec![ScriptedReply::ok(&["draft"])]);
    let mut resolver = ScriptedResolver::new();

    let (result, _) = run_template(
        "{{ assistant() }}{{ user() }}",
        &RunContext::default(),
        &mut resolver,
        &provider,
    )
    .await;
    let chat = result.unwrap();

    assert_eq!(roles_and_contents(&chat), vec![(MessageRole::User, "draft")]);
}

#[tokio::test]
async fn mid_stream_failure_keeps_prior_messages_only() {
    let provider =
        ScriptedProvider::new(vec![ScriptedReply::failing_after(&["Hel"], "connection reset")]);
    let mut resolver = ScriptedResolver::new();

    let (result, out) = run_template(
        "{{ system() }}sys---{{ user() }}hi---{{ assistant() }}---never reached",
        &RunContext::default(),
        &mut resolver,
        &provider,
    )
    .await;
    let err = result.unwrap_err();

    assert_eq!(err.section(), 2);
    assert!(matches!(
        err.kind(),
        TemplateRunErrorKind::CompletionStream(e) if e.message() == "connection reset"
    ));
    assert_eq!(
        roles_and_contents(err.partial_chat()),
        vec![(MessageRole::System, "sys"), (MessageRole::User, "hi")]
    );
    assert!(out.ends_with("Hel"));
    assert!(err.to_string().contains("section 3"));
}

#[tokio::test]
async fn missing_variable_input_aborts_the_run() {
    let provider = ScriptedProvider::new(Vec::new());
    let mut resolver = ScriptedResolver::new();

    let (result, _) = run_template(
        "intro---{{ who }}",
        &RunContext::default(),
        &mut resolver,
        &provider,
    )
    .await;
    let err = result.unwrap_err();

    assert!(matches!(err.kind(), TemplateRunErrorKind::VariablePrompt(_)));
    assert_eq!(err.section(), 1);
    assert_eq!(err.into_partial_chat().len(), 1);
}

#[tokio::test]
async fn syntax_errors_report_the_section() {
    let provider = ScriptedProvider::new(Vec::new());
    let mut resolver = ScriptedResolver::new();

    let (result, _) = run_template(
        "fine---{{ broken",
        &RunContext::default(),
        &mut resolver,
        &provider,
    )
    .await;
    let err = result.unwrap_err();

    assert!(matches!(err.kind(), TemplateRunErrorKind::Render(_)));
    assert_eq!(err.section(), 1);
    assert_eq!(err.partial_chat().messages()[0].content, "fine");
}

fn write_template(dir: &Path, name: &str, body: &str) {
    std::fs::write(dir.join(format!("{name}.j2")), body).unwrap();
}

#[test]
fn loader_prefers_earlier_directories() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    write_template(first.path(), "greet", "from first");
    write_template(second.path(), "greet", "from second");
    write_template(second.path(), "other", "only second");

    let loader = TemplateLoader::new(vec![first.path().to_path_buf(), second.path().to_path_buf()]);

    let template = loader.get_by_name(MODEL, "greet").unwrap().unwrap();
    assert_eq!(template.source(), "from first");
    assert_eq!(template.model(), MODEL);
    assert_eq!(template.name(), "greet");

    let other = loader.get_by_name(MODEL, "other.j2").unwrap().unwrap();
    assert_eq!(other.source(), "only second");
    assert_eq!(other.name(), "other");
}

#[test]
fn loader_reports_missing_templates_as_none() {
    let dir = TempDir::new().unwrap();
    let loader = TemplateLoader::new(vec![dir.path().join("absent"), dir.path().to_path_buf()]);
    assert!(loader.get_by_name(MODEL, "nope").unwrap().is_none());
}

#[test]
fn listing_reads_summaries_and_skips_shadowed_names() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    write_template(first.path(), "review", "{# summary: Does X #}\n{{ user() }}");
    write_template(second.path(), "review", "{# summary: Shadowed #}");
    write_template(second.path(), "bare", "no annotation");
    std::fs::write(second.path().join("notes.txt"), "ignored").unwrap();

    let loader = TemplateLoader::new(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
    let listed = loader.list();

    let names: Vec<(&str, &str)> = listed
        .iter()
        .map(|t| (t.name.as_str(), t.summary.as_str()))
        .collect();
    assert_eq!(names, vec![("bare", ""), ("review", "Does X")]);
    assert_eq!(listed[1].path, first.path().join("review.j2"));
}

#[test]
fn summary_annotation_accepts_trim_markers() {
    assert_eq!(
        loader::extract_summary("{#- summary:  Explain a diff  -#}"),
        Some("Explain a diff".to_string())
    );
    assert_eq!(loader::extract_summary("{# just a comment #}"), None);
}

#[test]
fn packaged_templates_are_listed() {
    let loader = TemplateLoader::new(vec![TemplateLoader::packaged_dir()]);
    let listed = loader.list();
    assert!(listed.iter().any(|t| t.name == "sh_system"));
    assert!(listed.iter().all(|t| !t.summary.is_empty()));
}
