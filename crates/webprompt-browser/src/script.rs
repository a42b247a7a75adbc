//! Page-side JavaScript snippets. Every caller-supplied string is embedded
//! as a JSON literal so quotes and newlines survive intact.

fn literal(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

pub(crate) fn count_nodes(selector: &str) -> String {
    format!("document.querySelectorAll({}).length", literal(selector))
}

pub(crate) fn last_node_text(selector: &str) -> String {
    format!(
        "(() => {{ const nodes = document.querySelectorAll({}); \
         return nodes.length ? nodes[nodes.length - 1].innerText : null; }})()",
        literal(selector)
    )
}

pub(crate) fn focus(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); \
         if (!el) return false; el.focus(); return true; }})()",
        literal(selector)
    )
}

/// Replace the content of a textarea or contenteditable control.
/// Evaluates to `false` when the control is missing.
pub(crate) fn fill(selector: &str, text: &str) -> String {
    format!(
        r#"(() => {{
  const el = document.querySelector({selector});
  if (!el) return false;
  el.focus();
  const text = {text};
  if (el.isContentEditable) {{
    document.execCommand('selectAll', false, null);
    document.execCommand('insertText', false, text);
  }} else {{
    const proto = Object.getPrototypeOf(el);
    const desc = Object.getOwnPropertyDescriptor(proto, 'value');
    if (desc && desc.set) {{ desc.set.call(el, text); }} else {{ el.value = text; }}
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  }}
  return true;
}})()"#,
        selector = literal(selector),
        text = literal(text)
    )
}
