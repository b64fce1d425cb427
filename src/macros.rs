#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __or_default {
    ($default:expr) => {
        $default
    };
    ($default:expr, $value:expr) => {
        $value
    };
}

/// Build a [`RuleDef`](crate::RuleDef).
///
/// Only `name` and `handler` are mandatory; everything else falls back to the
/// registry defaults (`default` queue, group index, enabled, either live mode,
/// no settings).
#[macro_export]
macro_rules! rule {
    (
        name: $name:expr
        $(, queue: $queue:expr)?
        $(, index: $index:expr)?
        $(, disabled: $disabled:expr)?
        $(, live: $live:expr)?
        $(, settings: $settings:expr)?
        , handler: $handler:expr
        $(,)?
    ) => {{
        $crate::RuleDef {
            name: ::std::string::String::from($name),
            handler: $handler,
            queue: $crate::__or_default!($crate::Queue::Default $(, $queue)?),
            index: $crate::__or_default!($crate::RuleIndex::Group $(, $index)?),
            disabled: $crate::__or_default!(false $(, $disabled)?),
            live: $crate::__or_default!($crate::LiveAffinity::Either $(, $live)?),
            settings: $crate::__or_default!(
                $crate::OptionMap::new()
                $(, match $settings {
                    $crate::serde_json::Value::Object(map) => map,
                    _ => $crate::OptionMap::new(),
                })?
            ),
        }
    }};
}

#[macro_export]
macro_rules! inner_rule {
    (
        name: $name:expr,
        queue: $queue:expr
        $(, live: $live:expr)?
        , handler: $handler:expr
        $(,)?
    ) => {{
        $crate::InnerRuleDef {
            name: ::std::string::String::from($name),
            queue: $queue,
            live: $crate::__or_default!($crate::LiveAffinity::Either $(, $live)?),
            handler: $handler,
        }
    }};
}
