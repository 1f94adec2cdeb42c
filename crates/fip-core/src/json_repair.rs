//! Best-effort repair of almost-JSON LLM output.
//!
//! A pure function: no semantic inference, no retry logic (retries live
//! in [`crate::llm::client`]). Applied, in order: code-fence stripping,
//! prose trimming, curly-quote normalization, trailing-comma removal.

/// Attempt to turn `raw` into a string that is more likely to parse as JSON.
pub fn repair(raw: &str) -> String {
    let stripped = strip_code_fences(raw);
    let trimmed = trim_to_outer_braces(&stripped);
    let normalized = normalize_curly_quotes(&trimmed);
    remove_trailing_commas(&normalized)
}

fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
        let rest = rest.trim_start_matches('\n');
        if let Some(end) = rest.rfind("```") {
            return rest[..end].trim().to_string();
        }
        return rest.trim().to_string();
    }
    trimmed.to_string()
}

fn trim_to_outer_braces(input: &str) -> String {
    let obj_start = input.find('{');
    let arr_start = input.find('[');

    let (start, open, close) = match (obj_start, arr_start) {
        (Some(o), Some(a)) if a < o => (a, '[', ']'),
        (Some(o), _) => (o, '{', '}'),
        (None, Some(a)) => (a, '[', ']'),
        (None, None) => return input.trim().to_string(),
    };

    match input.rfind(close) {
        Some(end) if end >= start => input[start..=end].to_string(),
        _ => {
            let _ = open;
            input.trim().to_string()
        }
    }
}

fn normalize_curly_quotes(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201F}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201B}' => '\'',
            other => other,
        })
        .collect()
}

/// Remove commas that immediately precede a closing `}` or `]`, ignoring
/// commas inside string literals.
fn remove_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        if c == '"' {
            in_string = true;
            out.push(c);
            i += 1;
            continue;
        }

        if c == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                i += 1;
                continue;
            }
        }

        out.push(c);
        i += 1;
    }

    out
}
