//! Embedded browser page
//!
//! The page replays `/history` on load, then posts each submission to
//! `/chat` and applies the streamed render commands as they arrive.

pub const CHAT_HTML: &str = r##"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>ChatGPT Clone</title>
<style>
  :root { --bg: #0e1117; --panel: #161b22; --line: #30363d; --text: #e6edf3; --muted: #8b949e; --accent: #ff4b4b; }
  * { box-sizing: border-box; }
  body { margin: 0; font: 15px/1.55 system-ui, sans-serif; background: var(--bg); color: var(--text); display: flex; height: 100vh; }
  aside { width: 300px; background: var(--panel); border-right: 1px solid var(--line); padding: 16px; overflow: auto; }
  aside button { width: 100%; padding: 8px; background: transparent; color: var(--text); border: 1px solid var(--line); border-radius: 6px; cursor: pointer; }
  aside button:hover { border-color: var(--accent); color: var(--accent); }
  aside pre { font-size: 11px; white-space: pre-wrap; word-break: break-all; color: var(--muted); }
  main { flex: 1; display: flex; flex-direction: column; }
  #messages { flex: 1; overflow: auto; padding: 24px 10%; }
  .msg { display: flex; gap: 12px; margin: 14px 0; }
  .avatar { flex: none; width: 32px; height: 32px; border-radius: 6px; display: grid; place-items: center; background: #262730; }
  .msg.user .avatar { background: var(--accent); }
  .body { flex: 1; min-width: 0; }
  .body img { max-width: 480px; border-radius: 6px; display: block; margin: 6px 0; }
  .body pre { background: #0d1117; border: 1px solid var(--line); border-radius: 6px; padding: 10px; overflow: auto; }
  .status { color: var(--muted); font-size: 13px; border: 1px solid var(--line); border-radius: 6px; padding: 4px 10px; margin: 4px 0; display: inline-block; }
  .status.running::before { content: "⟳ "; }
  .error { color: var(--accent); }
  form { display: flex; gap: 8px; padding: 12px 10%; border-top: 1px solid var(--line); }
  form input[type=text] { flex: 1; padding: 10px; background: var(--panel); color: var(--text); border: 1px solid var(--line); border-radius: 6px; }
  form button { padding: 10px 16px; background: var(--accent); color: white; border: 0; border-radius: 6px; cursor: pointer; }
  form button:disabled { opacity: .5; }
</style>
</head>
<body>
<aside>
  <button id="reset">Reset memory</button>
  <h4>Session items</h4>
  <pre id="items">[]</pre>
</aside>
<main>
  <div id="messages"></div>
  <form id="prompt">
    <input type="file" id="files" name="files" multiple accept=".txt,.jpg,.jpeg,.png">
    <input type="text" id="text" name="text" placeholder="Write a message for your assistant" autocomplete="off">
    <button type="submit">Send</button>
  </form>
</main>
<script>
const messages = document.getElementById("messages");

function escapeHtml(text) {
  return text.replace(/[&<>"']/g, c => ({"&": "&amp;", "<": "&lt;", ">": "&gt;", '"': "&quot;", "'": "&#39;"}[c]));
}

function markdown(text) {
  let html = escapeHtml(text).replace(/\\\$/g, "$");
  html = html.replace(/```(\w*)\n([\s\S]*?)```/g, (_, lang, code) => `<pre><code>${code}</code></pre>`);
  html = html.replace(/`([^`]+)`/g, "<code>$1</code>");
  html = html.replace(/\*\*([^*]+)\*\*/g, "<strong>$1</strong>");
  return html.replace(/\n/g, "<br>");
}

function container(role) {
  const last = messages.lastElementChild;
  if (last && last.dataset.role === role && !last.dataset.closed) return last.querySelector(".body");
  const el = document.createElement("div");
  el.className = "msg " + role;
  el.dataset.role = role;
  el.innerHTML = `<div class="avatar">${role === "user" ? "🧑" : "🤖"}</div><div class="body"></div>`;
  messages.appendChild(el);
  return el.querySelector(".body");
}

function block(parent, kind, value) {
  if (kind === "text") {
    const p = document.createElement("div");
    p.innerHTML = markdown(value);
    parent.appendChild(p);
  } else if (kind === "image") {
    const img = document.createElement("img");
    img.src = value;
    parent.appendChild(img);
  } else if (kind === "code") {
    const pre = document.createElement("pre");
    pre.textContent = value;
    parent.appendChild(pre);
  }
}

function closeContainers() {
  for (const el of messages.children) el.dataset.closed = "1";
}

async function refreshItems() {
  const res = await fetch("/session/items");
  document.getElementById("items").textContent = JSON.stringify(await res.json(), null, 2);
}

async function loadHistory() {
  messages.innerHTML = "";
  const res = await fetch("/history");
  for (const d of await res.json()) {
    block(container(d.role), d.body.kind, d.body.value);
  }
  closeContainers();
  refreshItems();
}

// Surfaces for the reply currently streaming
let surfaces = null;

function newSurfaces() {
  const body = container("ai");
  const make = () => { const el = document.createElement("div"); body.appendChild(el); return el; };
  return { status: make(), code: make(), image: make(), text: make() };
}

// Leftover status, code and image previews from an unfinished turn
function dropSurfaces() {
  if (surfaces) {
    for (const el of [surfaces.status, surfaces.code, surfaces.image]) el.remove();
  }
  surfaces = null;
}

function apply(cmd) {
  switch (cmd.type) {
    case "clear_surfaces":
      dropSurfaces();
      closeContainers();
      break;
    case "done":
      // Committed items replace the streamed previews
      surfaces = null;
      loadHistory();
      break;
    case "user_message":
      block(container("user"), "text", cmd.text);
      break;
    case "user_image":
      block(container("user"), "image", cmd.src);
      break;
    case "upload_status": {
      const body = container("user");
      let el = body.querySelector(`[data-file="${CSS.escape(cmd.file)}"]`);
      if (!el) { el = document.createElement("div"); el.dataset.file = cmd.file; body.appendChild(el); }
      el.className = "status " + cmd.phase;
      el.textContent = `${cmd.file}: ${cmd.label}`;
      break;
    }
    default:
      if (!surfaces) { closeContainers(); surfaces = newSurfaces(); }
      if (cmd.type === "status") {
        surfaces.status.className = "status " + cmd.phase;
        surfaces.status.textContent = cmd.label;
      } else if (cmd.type === "text") {
        surfaces.text.innerHTML = markdown(cmd.text);
      } else if (cmd.type === "code") {
        surfaces.code.innerHTML = "";
        block(surfaces.code, "code", cmd.code);
      } else if (cmd.type === "image") {
        surfaces.image.innerHTML = "";
        block(surfaces.image, "image", cmd.src);
      } else if (cmd.type === "error") {
        surfaces.text.innerHTML += `<div class="error">${escapeHtml(cmd.message)}</div>`;
      }
  }
  messages.scrollTop = messages.scrollHeight;
}

async function submit(ev) {
  ev.preventDefault();
  const text = document.getElementById("text");
  const files = document.getElementById("files");
  if (!text.value.trim() && files.files.length === 0) return;

  const form = new FormData();
  form.append("text", text.value);
  for (const f of files.files) form.append("files", f, f.name);
  text.value = "";
  files.value = "";

  const button = ev.target.querySelector("button");
  button.disabled = true;
  try {
    const res = await fetch("/chat", { method: "POST", body: form });
    if (!res.ok) {
      const err = await res.json().catch(() => ({ error: res.statusText }));
      apply({ type: "clear_surfaces" });
      apply({ type: "error", message: err.error });
      return;
    }
    const reader = res.body.getReader();
    const decoder = new TextDecoder();
    let buffer = "";
    for (;;) {
      const { value, done } = await reader.read();
      if (done) break;
      buffer += decoder.decode(value, { stream: true }).replace(/\r\n/g, "\n");
      let cut;
      while ((cut = buffer.indexOf("\n\n")) >= 0) {
        const frame = buffer.slice(0, cut);
        buffer = buffer.slice(cut + 2);
        const data = frame.split("\n").filter(l => l.startsWith("data:")).map(l => l.slice(5).trimStart()).join("\n");
        if (data) apply(JSON.parse(data));
      }
    }
  } finally {
    button.disabled = false;
    refreshItems();
  }
}

document.getElementById("prompt").addEventListener("submit", submit);
document.getElementById("reset").addEventListener("click", async () => {
  await fetch("/session/reset", { method: "POST" });
  loadHistory();
});
loadHistory();
</script>
</body>
</html>
"##;
