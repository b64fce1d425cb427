use crate::engine::{
    CompiledRules, EngineConfig, HtmlEntityMode, LineEnding, PipelineExecutor, ProtectedTag, RuleStep, RunMetrics,
    SafeTags,
};
use crate::{COMMON_LOCALE, Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

static DEFAULT_RULES: Lazy<Result<Arc<CompiledRules>>> =
    Lazy::new(|| crate::rules::registry().map(|registry| Arc::new(registry.compile())));

/// Engine construction options.
///
/// Deserializable from JSON (or any serde format):
///
/// ```json
/// {
///   "locale": "ru",
///   "line_ending": "CRLF",
///   "live": false,
///   "enable": "ru/optalign/*",
///   "disable": ["common/nbsp/*"],
///   "html_entity": { "kind": "name", "only_invisible": true }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Active locale, or `"common"` for locale-independent rules only.
    pub locale: String,
    pub line_ending: LineEnding,
    /// Live (as-you-type) mode.
    pub live: bool,
    /// Masks to enable, applied after `disable`.
    #[serde(deserialize_with = "one_or_many")]
    pub enable: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub disable: Vec<String>,
    pub html_entity: HtmlEntityMode,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            locale: COMMON_LOCALE.to_string(),
            line_ending: LineEnding::default(),
            live: false,
            enable: Vec::new(),
            disable: Vec::new(),
            html_entity: HtmlEntityMode::default(),
        }
    }
}

impl EngineOptions {
    pub fn for_locale(locale: impl Into<String>) -> Self {
        EngineOptions { locale: locale.into(), ..Self::default() }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(mask) => vec![mask],
        OneOrMany::Many(masks) => masks,
    })
}

/// Per-call overrides. `None` keeps the engine's configured value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExecuteOptions {
    pub locale: Option<String>,
    pub line_ending: Option<LineEnding>,
    pub html_entity: Option<HtmlEntityMode>,
}

/// Result from [`Typographer::execute_verbose`].
#[derive(Debug, Clone)]
pub struct ExecuteResult {
    pub text: String,
    /// Total elapsed time.
    pub elapsed: Duration,
    pub metrics: RunMetrics,
    /// Every applied rule with its input and output, in execution order.
    pub trace: Vec<RuleStep>,
}

/// A configured typography engine.
///
/// The rule set is shared (`Arc`) and immutable; the configuration belongs to
/// this instance. `execute` takes `&self`, so one engine can serve concurrent
/// callers.
///
/// # Example
/// ```
/// use orthotype::{EngineOptions, Typographer};
///
/// let engine = Typographer::new(EngineOptions::for_locale("ru")).unwrap();
/// assert_eq!(engine.execute("\"Привет\""), "«Привет»");
/// ```
#[derive(Debug, Clone)]
pub struct Typographer {
    rules: Arc<CompiledRules>,
    config: EngineConfig,
    safe_tags: SafeTags,
}

impl Typographer {
    /// Engine over the shipped rule catalog.
    pub fn new(options: EngineOptions) -> Result<Self> {
        let rules = (*DEFAULT_RULES).clone()?;
        Self::with_rules(rules, options)
    }

    /// Engine over a caller-built rule set.
    pub fn with_rules(rules: Arc<CompiledRules>, options: EngineOptions) -> Result<Self> {
        if options.locale != COMMON_LOCALE && !rules.has_locale(&options.locale) {
            return Err(Error::UnknownLocale(options.locale));
        }

        let mut config = EngineConfig::seeded(&rules);
        config.locale = options.locale;
        config.line_ending = options.line_ending;
        config.live = options.live;
        config.html_entity = options.html_entity;

        for mask in &options.disable {
            config.set_enabled(&rules, mask, false)?;
        }
        for mask in &options.enable {
            config.set_enabled(&rules, mask, true)?;
        }

        tracing::debug!(locale = %config.locale, rules = rules.rules().len(), live = config.live, "typographer ready");
        Ok(Typographer { rules, config, safe_tags: SafeTags::new() })
    }

    /// Typograph `text` with the engine's configuration.
    pub fn execute(&self, text: &str) -> String {
        self.execute_with(text, &ExecuteOptions::default())
    }

    pub fn execute_with(&self, text: &str, options: &ExecuteOptions) -> String {
        self.executor(options).run(text).text
    }

    /// Like [`execute_with`](Self::execute_with), plus metrics and the per-rule trace.
    pub fn execute_verbose(&self, text: &str, options: &ExecuteOptions) -> ExecuteResult {
        let run = self.executor(options).with_trace().run(text);
        ExecuteResult { text: run.text, elapsed: run.metrics.total, metrics: run.metrics, trace: run.trace }
    }

    fn executor<'a>(&'a self, options: &'a ExecuteOptions) -> PipelineExecutor<'a> {
        if let Some(locale) = options.locale.as_deref() {
            if locale != COMMON_LOCALE && !self.rules.has_locale(locale) {
                tracing::warn!(locale, "unknown locale override, only common rules will apply");
            }
        }
        PipelineExecutor::new(&self.rules, &self.config, &self.safe_tags).with_overrides(
            options.locale.as_deref(),
            options.line_ending,
            options.html_entity,
        )
    }

    /// Enable rules by exact name or `*` mask.
    pub fn enable(&mut self, mask: &str) -> Result<&mut Self> {
        self.config.set_enabled(&self.rules, mask, true)?;
        Ok(self)
    }

    pub fn disable(&mut self, mask: &str) -> Result<&mut Self> {
        self.config.set_enabled(&self.rules, mask, false)?;
        Ok(self)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.config.is_enabled(name)
    }

    pub fn setting(&self, rule: &str, key: &str) -> Option<&Value> {
        self.config.setting(rule, key)
    }

    pub fn set_setting(&mut self, rule: &str, key: &str, value: impl Into<Value>) -> &mut Self {
        self.config.set_setting(rule, key, value.into());
        self
    }

    /// Protect a custom region from every rule.
    pub fn add_protected_tag(&mut self, tag: impl Into<ProtectedTag>) -> Result<&mut Self> {
        self.safe_tags.add(tag.into())?;
        Ok(self)
    }

    pub fn locale(&self) -> &str {
        &self.config.locale
    }

    pub fn rules(&self) -> &Arc<CompiledRules> {
        &self.rules
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Queue, RuleContext, RuleIndex, RuleRegistry};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn engine(locale: &str) -> Typographer {
        Typographer::new(EngineOptions::for_locale(locale)).unwrap()
    }

    #[test]
    fn execute_is_idempotent_on_shipped_rules() {
        let inputs = [
            "",
            "\"Триллер \"Закрытая школа\" на СТС\"",
            "<p>Hello   \"world\" (test)</p>",
            "Глава 5. Итого 50%",
            "5-ый раз, скидка 12.5%",
            "don't  stop(now)",
            "<pre>a   b</pre>   x    y",
            "a\u{10FFFD}b  c",
            "&laquo;Hi&raquo;  there",
            "<a href=\"/\">\"Название\"</a>",
            "&#13;",
            "&nbsp;Б&#13;a",
            "a&#x0D;&#10;b  c",
        ];
        for locale in ["common", "ru", "en"] {
            let typographer = engine(locale);
            for input in inputs {
                let once = typographer.execute(input);
                assert_eq!(typographer.execute(&once), once, "locale {locale}, input {input:?}");
            }
        }
    }

    #[test]
    fn optalign_output_is_idempotent() {
        let mut typographer = engine("ru");
        typographer.enable("ru/optalign/*").unwrap();

        let once = typographer.execute("\"Цитата\"");
        assert_eq!(once, "<span class=\"optalign-n-lquote\">«</span>Цитата»");
        assert_eq!(typographer.execute(&once), once);
    }

    fn append_ten(text: &str, _: &RuleContext<'_>) -> String {
        format!("{text}+10")
    }

    fn append_twenty(text: &str, _: &RuleContext<'_>) -> String {
        format!("{text}+20")
    }

    #[test]
    fn lower_index_output_feeds_higher_index() {
        let mut registry = RuleRegistry::new().with_group("test", 0);
        registry
            .register(rule! { name: "common/test/twenty", index: RuleIndex::from(20), handler: append_twenty })
            .unwrap()
            .register(rule! { name: "common/test/ten", index: RuleIndex::from(10), handler: append_ten })
            .unwrap();
        let typographer = Typographer::with_rules(Arc::new(registry.compile()), EngineOptions::default()).unwrap();

        let result = typographer.execute_verbose("x", &ExecuteOptions::default());
        let names: Vec<&str> = result.trace.iter().map(|s| s.rule.as_str()).collect();
        assert_eq!(names, ["common/test/ten", "common/test/twenty"]);
        assert_eq!(result.trace[1].input, result.trace[0].output);
        assert_eq!(result.text, "x+10+20");
    }

    #[test]
    fn disabling_optalign_leaves_number_rules_alone() {
        let mut typographer = engine("ru");
        let before: Vec<bool> =
            ["ru/number/comma", "ru/number/ordinals"].iter().map(|n| typographer.is_enabled(n)).collect();

        typographer.enable("ru/optalign/*").unwrap().disable("ru/optalign/*").unwrap();

        assert!(!typographer.is_enabled("ru/optalign/quote"));
        let after: Vec<bool> =
            ["ru/number/comma", "ru/number/ordinals"].iter().map(|n| typographer.is_enabled(n)).collect();
        assert_eq!(after, before);
        assert_eq!(after, [true, true]);
    }

    #[test]
    fn quotes_through_the_pipeline() {
        let options = EngineOptions { disable: vec!["common/nbsp/*".into()], ..EngineOptions::for_locale("ru") };
        let mut typographer = Typographer::new(options).unwrap();
        let input = "\"Триллер \"Закрытая школа\" на СТС\"";
        assert_eq!(typographer.execute(input), "«Триллер „Закрытая школа“ на СТС»");

        typographer.set_setting(
            "common/punctuation/quote",
            "ru",
            json!({"left": "««", "right": "»»", "collapse_duplicates": true}),
        );
        assert_eq!(typographer.execute(input), "«Триллер «Закрытая школа» на СТС»");

        let options = EngineOptions { disable: vec!["common/nbsp/*".into()], ..EngineOptions::for_locale("en") };
        let typographer = Typographer::new(options).unwrap();
        assert_eq!(typographer.execute("\"Name 1\""), "“Name 1”");
        assert_eq!(typographer.execute("<b>\"Name 1\"</b>"), "<b>“Name 1”</b>");
    }

    #[test]
    fn quote_link_sees_link_tags() {
        let typographer = engine("ru");
        assert_eq!(typographer.execute("<a href=\"/\">\"Название\"</a>"), "«<a href=\"/\">Название</a>»");
    }

    #[test]
    fn protected_blocks_keep_their_whitespace() {
        let typographer = engine("common");
        assert_eq!(typographer.execute("<pre>a   b</pre>   x    y"), "<pre>a   b</pre> x y");
        assert_eq!(typographer.execute("<code>x  y</code>  z"), "<code>x  y</code> z");
        assert_eq!(typographer.execute("see http://a.b/c?d=1  now"), "see http://a.b/c?d=1 now");
    }

    #[test]
    fn custom_protected_tags() {
        let mut typographer = engine("common");
        typographer.add_protected_tag(ProtectedTag::delimited(r"\[\[", r"\]\]")).unwrap();
        assert_eq!(typographer.execute("[[a  b]]  c"), "[[a  b]] c");

        assert!(matches!(typographer.add_protected_tag(ProtectedTag::pattern("x*")), Err(Error::InvalidProtectedTag(_))));
    }

    #[test]
    fn line_endings() {
        let options = EngineOptions { line_ending: LineEnding::CrLf, ..EngineOptions::default() };
        let typographer = Typographer::new(options).unwrap();
        assert_eq!(typographer.execute("a  b\r\nc\rd"), "a b\r\nc\r\nd");

        let per_call = ExecuteOptions { line_ending: Some(LineEnding::Cr), ..ExecuteOptions::default() };
        assert_eq!(typographer.execute_with("a\nb", &per_call), "a\rb");
    }

    #[test]
    fn live_mode() {
        let live = Typographer::new(EngineOptions { live: true, ..EngineOptions::for_locale("ru") }).unwrap();
        let normal = engine("ru");

        assert_eq!(normal.execute("Глава 5"), "Глава\u{A0}5");
        assert_eq!(live.execute("Глава 5"), "Глава 5");

        assert_eq!(normal.execute("a&nbsp;b"), "a\u{A0}b");
        assert_eq!(live.execute("a&nbsp;b"), "a b");
    }

    #[test]
    fn entity_modes() {
        let options = EngineOptions {
            html_entity: HtmlEntityMode { kind: crate::EntityKind::Name, only_invisible: true },
            ..EngineOptions::default()
        };
        let typographer = Typographer::new(options).unwrap();
        assert_eq!(typographer.execute("a&nbsp;b «c»"), "a&nbsp;b «c»");
        assert_eq!(typographer.execute("<code>&nbsp;</code>"), "<code>&nbsp;</code>");
    }

    #[test]
    fn per_call_locale_override() {
        let typographer = engine("en");
        let ru = ExecuteOptions { locale: Some("ru".into()), ..ExecuteOptions::default() };
        assert_eq!(typographer.execute_with("\"Привет\"", &ru), "«Привет»");
        assert_eq!(typographer.execute("\"Hi\""), "“Hi”");
        assert_eq!(typographer.locale(), "en");
    }

    #[test]
    fn unknown_locale_is_rejected() {
        assert!(matches!(
            Typographer::new(EngineOptions::for_locale("xx")),
            Err(Error::UnknownLocale(locale)) if locale == "xx"
        ));
        assert!(Typographer::new(EngineOptions::for_locale("common")).is_ok());
    }

    #[test]
    fn options_from_json() {
        let options: EngineOptions = serde_json::from_value(json!({
            "locale": "ru",
            "line_ending": "CRLF",
            "live": true,
            "enable": "ru/optalign/*",
            "disable": ["common/nbsp/afterNumber", "common/space/*"],
            "html_entity": {"kind": "name", "only_invisible": true}
        }))
        .unwrap();

        assert_eq!(options.locale, "ru");
        assert_eq!(options.line_ending, LineEnding::CrLf);
        assert!(options.live);
        assert_eq!(options.enable, ["ru/optalign/*"]);
        assert_eq!(options.disable.len(), 2);
        assert!(options.html_entity.only_invisible);

        let typographer = Typographer::new(options).unwrap();
        assert!(typographer.is_enabled("ru/optalign/quote"));
        assert!(!typographer.is_enabled("common/space/delRepeatSpace"));

        let defaults: EngineOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(defaults.locale, "common");
    }

    #[test]
    fn settings_are_seeded_and_mutable() {
        let mut typographer = engine("ru");
        assert_eq!(typographer.setting("common/nbsp/beforeShortLastWord", "length_last_word"), Some(&json!(3)));

        typographer.set_setting("common/nbsp/beforeShortLastNumber", "length_last_number", 3);
        assert_eq!(typographer.execute("Страница 123"), "Страница\u{A0}123");
    }

    #[test]
    fn verbose_run_reports_metrics_and_trace() {
        let typographer = engine("ru");
        let input = "<p>\"Привет\"   мир</p>";
        let result = typographer.execute_verbose(input, &ExecuteOptions::default());

        assert_eq!(result.text, typographer.execute(input));
        assert_eq!(result.elapsed, result.metrics.total);
        assert_eq!(result.metrics.queues.len(), 12);
        assert!(result.metrics.html_likely);
        assert_eq!(result.metrics.protected_spans, 2);

        let quote = result.trace.iter().find(|s| s.rule == "common/punctuation/quote").unwrap();
        assert_eq!(quote.queue, Queue::Default);
        assert!(quote.changed());
        assert!(result.trace.iter().any(|s| s.inner && s.queue == Queue::Start));
        assert!(result.metrics.rules_applied() >= result.trace.len());
    }

    #[test]
    fn engines_share_rules_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Typographer>();

        let typographer = Arc::new(engine("ru"));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let t = Arc::clone(&typographer);
                std::thread::spawn(move || t.execute("\"a\"  b"))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), "«a» b");
        }
    }
}
