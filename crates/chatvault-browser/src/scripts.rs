//! Page-side scripts evaluated through `Runtime.evaluate`.
//!
//! The page only observes and snapshots; extraction, dedup and scheduling
//! run in the capture engine.

/// Binding the observer calls with `"mutation"`, `"scroll"` or `"shell"`.
pub const NOTIFY_BINDING: &str = "__chatvault_notify";

/// Readiness probe: logged-in view present, observer installed, QR shown.
pub const PROBE_SCRIPT: &str = r#"(() => ({
  ready: !!document.querySelector('#pane-side'),
  injected: !!window.__chatvault_injected,
  qr: !!(document.querySelector('[data-testid="qrcode"]') || document.querySelector('canvas[aria-label]')),
}))()"#;

/// Header title of the open conversation, or `null`.
pub const CHAT_NAME_SCRIPT: &str = r#"(() => {
  const el = document.querySelector('#main header span[dir="auto"]');
  if (el && el.textContent.trim()) return el.textContent.trim();
  const titled = document.querySelector('#main header span[title]');
  if (titled) return (titled.getAttribute('title') || '').trim() || null;
  return null;
})()"#;

/// Installs the change observers once per document.
///
/// The message-list observer is re-attached whenever `#main` is replaced;
/// the shell observer reports only header title changes.
pub const OBSERVER_SCRIPT: &str = r#"(() => {
  if (window.__chatvault_injected) return true;
  const notify = (kind) => { try { window.__chatvault_notify(kind); } catch (e) {} };
  const chatName = () => {
    const el = document.querySelector('#main header span[dir="auto"]')
      || document.querySelector('#main header span[title]');
    return el ? (el.textContent || el.getAttribute('title') || '').trim() : '';
  };

  let listObserver = null;
  let listTarget = null;
  const attachList = () => {
    const main = document.querySelector('#main');
    const target = main ? (main.querySelector('[role="application"]') || main) : null;
    if (target === listTarget) return;
    if (listObserver) listObserver.disconnect();
    listTarget = target;
    if (!target) return;
    listObserver = new MutationObserver(() => notify('mutation'));
    listObserver.observe(target, { childList: true, subtree: true });
    target.addEventListener('scroll', () => notify('scroll'), { passive: true, capture: true });
    notify('mutation');
  };

  let lastChat = chatName();
  const shell = document.querySelector('#app') || document.body;
  new MutationObserver(() => {
    attachList();
    const current = chatName();
    if (current !== lastChat) {
      lastChat = current;
      notify('shell');
    }
  }).observe(shell, { childList: true, subtree: true });

  attachList();
  window.__chatvault_injected = true;
  return true;
})()"#;

/// Snapshot of every rendered message row, shaped like `MessageElement`.
pub const SNAPSHOT_SCRIPT: &str = r#"(() => {
  const text = (n) => (n && n.textContent ? n.textContent.trim() : '');
  const src = (img) => (img && img.src ? img.src : null);
  const rows = document.querySelectorAll('.message-in, .message-out');
  return Array.from(rows).map((el) => {
    const idEl = el.closest('[data-id]');
    const senderEl = el.querySelector('span._ahxy[dir="auto"]');
    const meta = el.querySelector('.copyable-text[data-pre-plain-text]');

    const attachments = [];
    const thumb = el.querySelector('[data-testid="image-thumb"]');
    const blobImg = el.querySelector('img[src*="blob"]');
    if (thumb || blobImg) {
      attachments.push({ kind: 'image', src: src(thumb ? thumb.querySelector('img') : blobImg) });
    }
    if (el.querySelector('[data-testid="audio-play"], audio')) attachments.push({ kind: 'audio' });
    if (el.querySelector('[data-testid="video-thumb"], video')) attachments.push({ kind: 'video' });
    if (el.querySelector('[data-testid="document-thumb"]')) attachments.push({ kind: 'document' });
    if (el.querySelector('[data-testid="sticker"]')) {
      attachments.push({ kind: 'sticker', src: src(blobImg) });
    }

    return {
      classes: Array.from(el.classList),
      dataId: idEl ? idEl.getAttribute('data-id') : null,
      senderLabel: text(senderEl) || null,
      prePlainText: meta ? meta.getAttribute('data-pre-plain-text') : null,
      selectableTexts: Array.from(el.querySelectorAll('span[data-testid="selectable-text"]'))
        .map((s) => ({ text: text(s), quoted: s.classList.contains('quoted-mention') })),
      metadataLines: meta ? Array.from(meta.querySelectorAll(':scope > span')).map(text) : [],
      attachments,
      spanTexts: Array.from(el.querySelectorAll('span')).map(text),
    };
  });
})()"#;

/// Reads a `blob:` URL into a `data:` URL; resolves to `null` when it is gone.
pub fn resolve_blob_script(url: &str) -> String {
    let quoted = serde_json::Value::String(url.to_string()).to_string();
    format!(
        r#"(async () => {{
  try {{
    const response = await fetch({});
    const blob = await response.blob();
    return await new Promise((resolve, reject) => {{
      const reader = new FileReader();
      reader.onloadend = () => resolve(reader.result);
      reader.onerror = reject;
      reader.readAsDataURL(blob);
    }});
  }} catch (e) {{
    return null;
  }}
}})()"#,
        quoted
    )
}
