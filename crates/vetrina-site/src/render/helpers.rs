//! Template helper functions.
//!
//! Pure string and number formatting exposed to templates. Each helper
//! wraps a plain function so the transformations stay testable outside the
//! engine.

use chrono::{DateTime, Utc};
use handlebars::{
    Context, Handlebars, Helper, HelperResult, JsonValue, Output, RenderContext, handlebars_helper,
};

/// Binary-prefix byte formatting: `1536` → `"1.5 Kb"`.
pub fn readable_size(mut value: f64) -> String {
    for unit in ["", "K", "M", "G", "T", "P", "E", "Z"] {
        if value.abs() < 1024.0 {
            return format!("{value:3.1} {unit}b");
        }
        value /= 1024.0;
    }
    format!("{value:.1} Yib")
}

/// Truncate to `max` characters, trailing ellipsis.
pub fn summarize(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let head: String = value.chars().take(max).collect();
    format!("{}...", head.trim_end())
}

/// Keep the tail of the string, leading ellipsis.
pub fn summarize_suffix(value: &str, max: usize) -> String {
    let len = value.chars().count();
    if len <= max {
        return value.to_string();
    }
    // Beyond twice the budget the cut point stays at `max`.
    let start = if len - max <= max { len - max } else { max };
    let tail: String = value.chars().skip(start).collect();
    format!("...{}", tail.trim_start())
}

/// Everything before the last `/`, or empty.
pub fn parent_path(value: &str) -> String {
    value
        .rsplit_once('/')
        .map(|(head, _)| head.to_string())
        .unwrap_or_default()
}

/// Final path segment, or empty when the path ends in `/`.
pub fn basename(value: &str) -> String {
    value.rsplit('/').next().unwrap_or("").to_string()
}

/// `snake_case` → `SnakeCase`; empty segments become `_`.
pub fn camelize(value: &str) -> String {
    value
        .split('_')
        .map(|word| {
            if word.is_empty() {
                "_".to_string()
            } else {
                capitalize(word)
            }
        })
        .collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// Split an identifier on uppercase boundaries, underscores and dashes,
/// joining the pieces with spaces: `themeColor_main` → `theme Color main`.
pub fn var_name_to_string(value: &str) -> String {
    let mut segments: Vec<String> = Vec::new();
    let mut current: Option<String> = None;

    for c in value.chars() {
        let starts_new = match &current {
            Some(_) => c.is_ascii_uppercase(),
            None => c.is_ascii_alphabetic(),
        };
        if starts_new {
            if let Some(segment) = current.take() {
                segments.push(segment);
            }
            current = Some(c.to_string());
        } else if let Some(segment) = &mut current {
            segment.push(c);
        }
    }
    if let Some(segment) = current.take() {
        segments.push(segment);
    }

    segments
        .iter()
        .flat_map(|s| s.split('_'))
        .flat_map(|s| s.split('-'))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop markup tags and decode the common character entities.
pub fn strip_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_tag = false;
    for c in value.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// Epoch seconds formatted with a strftime-style pattern.
pub fn format_timestamp(secs: i64, fmt: &str) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|dt| dt.format(fmt).to_string())
        .unwrap_or_default()
}

/// Relative-time phrasing in Italian: "3 giorni fa", "1 ora fa", "adesso".
pub fn pretty_date(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now - then;
    let days = diff.num_days();
    let secs = (diff.num_seconds() - days * 86_400) as f64;
    let days = days as f64;

    let periods: [(f64, &str, &str); 7] = [
        (days / 365.0, "anno", "anni"),
        (days / 30.0, "mese", "mesi"),
        (days / 7.0, "settimana", "settimane"),
        (days, "giorno", "giorni"),
        (secs / 3600.0, "ora", "ore"),
        (secs / 60.0, "minuto", "minuti"),
        (secs, "secondo", "secondi"),
    ];

    for (period, singular, plural) in periods {
        let n = period.trunc();
        if n >= 1.0 {
            let label = if n > 1.0 { plural } else { singular };
            return format!("{} {label} fa", n as i64);
        }
    }

    "adesso".to_string()
}

handlebars_helper!(eq: |a: JsonValue, b: JsonValue| a == b);
handlebars_helper!(hb_readable_size: |v: f64| readable_size(v));
handlebars_helper!(hb_summarize: |v: str, {max: u64 = 30}| summarize(v, max as usize));
handlebars_helper!(hb_summarize_suffix: |v: str, {max: u64 = 30}| summarize_suffix(v, max as usize));
handlebars_helper!(hb_parent_path: |v: str| parent_path(v));
handlebars_helper!(hb_basename: |v: str| basename(v));
handlebars_helper!(hb_dirname: |v: str| parent_path(v));
handlebars_helper!(hb_camelize: |v: str| camelize(v));
handlebars_helper!(hb_var_name_to_string: |v: str| var_name_to_string(v));
handlebars_helper!(hb_strip_html: |v: str| strip_html(v));
handlebars_helper!(hb_pretty_date: |secs: i64| {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|then| pretty_date(then, Utc::now()))
        .unwrap_or_default()
});

/// Register every site helper on the engine.
pub fn register(hb: &mut Handlebars<'_>, date_time_format: &str) {
    hb.register_helper("eq", Box::new(eq));
    hb.register_helper("readable_size", Box::new(hb_readable_size));
    hb.register_helper("summarize", Box::new(hb_summarize));
    hb.register_helper("summarize_suffix", Box::new(hb_summarize_suffix));
    hb.register_helper("parent_path", Box::new(hb_parent_path));
    hb.register_helper("basename", Box::new(hb_basename));
    hb.register_helper("dirname", Box::new(hb_dirname));
    hb.register_helper("camelize", Box::new(hb_camelize));
    hb.register_helper("var_name_to_string", Box::new(hb_var_name_to_string));
    hb.register_helper("strip_html", Box::new(hb_strip_html));
    hb.register_helper("pretty_date", Box::new(hb_pretty_date));

    // The default pattern comes from configuration, so this one is a
    // closure rather than a `handlebars_helper!` expansion.
    let default_fmt = date_time_format.to_string();
    hb.register_helper(
        "format_timestamp",
        Box::new(
            move |h: &Helper,
                  _r: &Handlebars,
                  _ctx: &Context,
                  _rc: &mut RenderContext,
                  out: &mut dyn Output|
                  -> HelperResult {
                let secs = h.param(0).and_then(|v| v.value().as_i64()).unwrap_or(0);
                let fmt = h
                    .hash_get("fmt")
                    .and_then(|v| v.value().as_str())
                    .unwrap_or(&default_fmt);
                out.write(&format_timestamp(secs, fmt))?;
                Ok(())
            },
        ),
    );
}
