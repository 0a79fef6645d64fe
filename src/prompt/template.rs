use crate::error::{ClientError, Result};

/// Substitute `{name}` placeholders in `template`.
///
/// `{{` and `}}` render as literal braces. Any placeholder not listed in
/// `vars`, or a stray brace, is an error.
pub(crate) fn render(template: &str, vars: &[(&str, &str)]) -> Result<String> {
    let fail = |message: String| ClientError::Template {
        template: template.to_string(),
        message,
    };

    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') => {
                            return Err(fail("unexpected '{' in placeholder".to_string()))
                        }
                        Some(ch) => name.push(ch),
                        None => return Err(fail("unclosed placeholder".to_string())),
                    }
                }

                let value = vars
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| *value)
                    .ok_or_else(|| fail(format!("unknown placeholder {{{}}}", name)))?;
                out.push_str(value);
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(fail("single '}' encountered".to_string())),
            c => out.push(c),
        }
    }

    Ok(out)
}
