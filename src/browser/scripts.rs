//! JavaScript snippets evaluated in the page by [`ChromeBrowser`].
//!
//! Every user-supplied string is embedded as a JSON literal, never by quote
//! replacement, so selectors containing quotes or backslashes survive intact.
//!
//! [`ChromeBrowser`]: super::chrome::ChromeBrowser

use crate::core::{ElementOp, Target};

pub const PROBE: &str = "1 + 1";
pub const CONTENT: &str = "document.documentElement.outerHTML";
pub const BODY_HTML: &str = "document.body ? document.body.innerHTML : ''";

/// Resolves `true` once the document has loaded and no new resources have
/// appeared for `quiet_ms`, or `false` after `max_ms`.
pub fn network_idle(quiet_ms: u64, max_ms: u64) -> String {
    format!(
        r#"
        new Promise((resolve) => {{
            const quiet = {quiet_ms};
            let last = performance.getEntriesByType('resource').length;
            let stableSince = Date.now();
            const started = Date.now();
            const tick = () => {{
                const now = performance.getEntriesByType('resource').length;
                if (now !== last) {{
                    last = now;
                    stableSince = Date.now();
                }}
                if (document.readyState === 'complete' && Date.now() - stableSince >= quiet) {{
                    resolve(true);
                }} else if (Date.now() - started >= {max_ms}) {{
                    resolve(false);
                }} else {{
                    setTimeout(tick, 100);
                }}
            }};
            tick();
        }})
        "#
    )
}

const HELPERS: &str = r#"
    const __norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
    const __visible = (el) => {
        if (!el || !el.isConnected) return false;
        const style = window.getComputedStyle(el);
        if (style.display === 'none' || style.visibility === 'hidden' || style.opacity === '0') return false;
        const rect = el.getBoundingClientRect();
        return rect.width > 0 && rect.height > 0;
    };
    const __role = (el) => {
        const explicit = el.getAttribute('role');
        if (explicit) return explicit.split(' ')[0].toLowerCase();
        const tag = el.tagName.toLowerCase();
        const type = (el.getAttribute('type') || 'text').toLowerCase();
        switch (tag) {
            case 'a': return el.hasAttribute('href') ? 'link' : null;
            case 'button': return 'button';
            case 'input':
                if (['submit', 'button', 'reset', 'image'].includes(type)) return 'button';
                if (type === 'checkbox') return 'checkbox';
                if (type === 'radio') return 'radio';
                if (type === 'search') return 'searchbox';
                if (['text', 'email', 'tel', 'url', 'password', 'number'].includes(type)) return 'textbox';
                return null;
            case 'textarea': return 'textbox';
            case 'select': return el.multiple ? 'listbox' : 'combobox';
            case 'option': return 'option';
            case 'h1': case 'h2': case 'h3': case 'h4': case 'h5': case 'h6': return 'heading';
            case 'img': return 'img';
            case 'nav': return 'navigation';
            case 'main': return 'main';
            case 'form': return 'form';
            case 'ul': case 'ol': return 'list';
            case 'li': return 'listitem';
            case 'table': return 'table';
            case 'dialog': return 'dialog';
            default: return null;
        }
    };
    const __name = (el) => {
        const aria = el.getAttribute('aria-label');
        if (aria) return __norm(aria);
        const labelledBy = el.getAttribute('aria-labelledby');
        if (labelledBy) {
            const text = labelledBy.split(' ')
                .map((id) => document.getElementById(id))
                .filter(Boolean)
                .map((n) => n.textContent)
                .join(' ');
            if (__norm(text)) return __norm(text);
        }
        if (el.id) {
            const label = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
            if (label && __norm(label.textContent)) return __norm(label.textContent);
        }
        const wrapping = el.closest('label');
        if (wrapping && __norm(wrapping.textContent)) return __norm(wrapping.textContent);
        for (const attr of ['alt', 'title', 'placeholder']) {
            const v = el.getAttribute(attr);
            if (v && __norm(v)) return __norm(v);
        }
        if (el.tagName === 'INPUT' && el.value) return __norm(el.value);
        return __norm(el.innerText || el.textContent);
    };
"#;

fn resolver(target: &Target) -> String {
    let lit = |s: &str| serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string());
    match target {
        Target::Css(selector) => format!(
            "Array.from(document.querySelectorAll({}))",
            lit(selector)
        ),
        Target::XPath(xpath) => format!(
            r#"(() => {{
                const snap = document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
                const out = [];
                for (let i = 0; i < snap.snapshotLength; i++) out.push(snap.snapshotItem(i));
                return out;
            }})()"#,
            lit(xpath)
        ),
        Target::Role { role, name } => format!(
            r#"(() => {{
                const role = {};
                const name = {};
                return Array.from(document.querySelectorAll('*')).filter((el) => {{
                    if (__role(el) !== role) return false;
                    if (name === null) return true;
                    return __name(el).toLowerCase().includes(name.toLowerCase());
                }});
            }})()"#,
            lit(&role.to_lowercase()),
            name.as_deref().map(lit).unwrap_or_else(|| "null".to_string())
        ),
        Target::Text { text, exact } => format!(
            r#"(() => {{
                const wanted = __norm({}).toLowerCase();
                const exact = {};
                const matches = (el) => {{
                    const t = __norm(el.innerText || el.textContent).toLowerCase();
                    return exact ? t === wanted : t.includes(wanted);
                }};
                const root = document.body || document.documentElement;
                return Array.from(root.querySelectorAll('*')).filter((el) => {{
                    if (['SCRIPT', 'STYLE', 'NOSCRIPT'].includes(el.tagName)) return false;
                    if (!matches(el)) return false;
                    return !Array.from(el.children).some(matches);
                }});
            }})()"#,
            lit(text),
            exact
        ),
        Target::LinkHref(pattern) => format!(
            r#"(() => {{
                const pattern = {};
                return Array.from(document.querySelectorAll('a[href]'))
                    .filter((a) => a.getAttribute('href').includes(pattern) || a.href.includes(pattern));
            }})()"#,
            lit(pattern)
        ),
    }
}

/// Describes every element matching `target`.
pub fn query(target: &Target) -> String {
    format!(
        r#"
        (function() {{
            {HELPERS}
            let els;
            try {{
                els = {};
            }} catch (e) {{
                return {{ ok: false, code: 'invalid_selector', error: e.message }};
            }}
            return {{
                ok: true,
                elements: els.map((el, index) => {{
                    const attributes = {{}};
                    for (const attr of el.attributes) attributes[attr.name] = attr.value;
                    const rect = el.getBoundingClientRect();
                    const text = __norm(el.innerText || el.textContent);
                    return {{
                        index: index,
                        tag_name: el.tagName.toLowerCase(),
                        element_id: el.id || null,
                        class_name: (typeof el.className === 'string' && el.className) ? el.className : null,
                        text_content: text ? text.slice(0, 200) : null,
                        attributes: attributes,
                        visible: __visible(el),
                        rect: {{ x: rect.x, y: rect.y, width: rect.width, height: rect.height }}
                    }};
                }})
            }};
        }})()
        "#,
        resolver(target)
    )
}

fn op_body(op: &ElementOp) -> String {
    let lit = |s: &str| serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string());
    match op {
        ElementOp::Click => r#"
            el.scrollIntoView({ block: 'center' });
            el.focus();
            el.click();
        "#
        .to_string(),
        ElementOp::Hover => r#"
            el.scrollIntoView({ block: 'center' });
            const rect = el.getBoundingClientRect();
            const init = { bubbles: true, cancelable: true, clientX: rect.left + rect.width / 2, clientY: rect.top + rect.height / 2 };
            ['mouseover', 'mouseenter', 'mousemove'].forEach((t) => el.dispatchEvent(new MouseEvent(t, init)));
        "#
        .to_string(),
        ElementOp::Fill(text) => format!(
            r#"
            const value = {};
            const tag = el.tagName;
            if (el.isContentEditable) {{
                el.focus();
                el.textContent = value;
            }} else if (tag === 'INPUT' || tag === 'TEXTAREA') {{
                if (el.readOnly) return {{ ok: false, code: 'not_interactable', error: 'element is read-only' }};
                el.focus();
                const proto = tag === 'INPUT' ? HTMLInputElement.prototype : HTMLTextAreaElement.prototype;
                const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
                setter.call(el, value);
            }} else {{
                return {{ ok: false, code: 'not_interactable', error: 'element is not an <input>, <textarea> or contenteditable' }};
            }}
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            "#,
            lit(text)
        ),
        ElementOp::SelectOption(value) => format!(
            r#"
            const wanted = {};
            if (el.tagName !== 'SELECT') return {{ ok: false, code: 'not_interactable', error: 'element is not a <select>' }};
            const options = Array.from(el.options);
            const option = options.find((o) => o.value === wanted)
                || options.find((o) => __norm(o.label || o.textContent) === __norm(wanted));
            if (!option) return {{ ok: false, code: 'invalid', error: 'no option with value or label ' + wanted }};
            el.value = option.value;
            option.selected = true;
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            "#,
            lit(value)
        ),
        ElementOp::SubmitForm => r#"
            const form = el.tagName === 'FORM' ? el : (el.form || el.closest('form'));
            if (!form) return { ok: false, code: 'invalid', error: 'element is not inside a form' };
            if (typeof form.requestSubmit === 'function') form.requestSubmit(); else form.submit();
        "#
        .to_string(),
    }
}

/// Applies `op` to the `index`-th match of `target`.
pub fn perform(target: &Target, index: usize, op: &ElementOp) -> String {
    let needs_visible = !matches!(op, ElementOp::SubmitForm);
    format!(
        r#"
        (function() {{
            {HELPERS}
            let els;
            try {{
                els = {};
            }} catch (e) {{
                return {{ ok: false, code: 'invalid_selector', error: e.message }};
            }}
            const el = els[{index}];
            if (!el) return {{ ok: false, code: 'not_found', count: els.length }};
            if ({needs_visible} && !__visible(el)) return {{ ok: false, code: 'not_interactable', error: 'element is not visible' }};
            if (el.disabled) return {{ ok: false, code: 'not_interactable', error: 'element is disabled' }};
            try {{
                {}
            }} catch (e) {{
                return {{ ok: false, code: 'error', error: e.message }};
            }}
            return {{ ok: true, tag: el.tagName.toLowerCase() }};
        }})()
        "#,
        resolver(target),
        op_body(op)
    )
}
