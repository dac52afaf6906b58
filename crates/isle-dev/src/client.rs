//! Browser-side scripts served by the dev server.
//!
//! The update client subscribes to the event stream and reacts to the three
//! message types. The overlay renders runtime errors on top of the page and
//! exposes itself as `window.__isleOverlay` so the update client can drive it.

/// Update client script URL.
pub const CLIENT_SCRIPT_URL: &str = "/__isle/client.js";

/// Error overlay script URL.
pub const OVERLAY_SCRIPT_URL: &str = "/__isle/overlay.js";

/// Server-Sent Events endpoint.
pub const EVENTS_URL: &str = "/__isle/events";

/// Tags injected into every HTML page.
pub const SCRIPT_TAGS: &str = concat!(
    r#"<script type="module" src="/__isle/client.js"></script>"#,
    r#"<script src="/__isle/overlay.js"></script>"#
);

pub const CLIENT_SCRIPT: &str = r#"// isle dev update client
const source = new EventSource("/__isle/events");

source.onopen = () => {
  console.debug("[isle] connected");
};

source.onmessage = (message) => {
  let event;
  try {
    event = JSON.parse(message.data);
  } catch {
    return;
  }

  switch (event.type) {
    case "reload":
      location.reload();
      break;
    case "update": {
      window.__isleOverlay?.hide();
      const update = new CustomEvent("isle:update", {
        detail: { path: event.path },
        cancelable: true,
      });
      if (window.dispatchEvent(update)) {
        location.reload();
      }
      break;
    }
    case "error":
      console.error("[isle]", event.message);
      window.__isleOverlay?.show(event.message, event.stack);
      break;
  }
};

source.onerror = () => {
  console.debug("[isle] connection lost, retrying");
};
"#;

pub const OVERLAY_SCRIPT: &str = r#"// isle dev error overlay
(() => {
  const ID = "__isle-error-overlay";

  function hide() {
    document.getElementById(ID)?.remove();
  }

  function show(message, stack) {
    hide();
    const root = document.createElement("div");
    root.id = ID;
    root.style.cssText =
      "position:fixed;inset:0;z-index:2147483647;overflow:auto;" +
      "background:rgba(20,20,24,0.94);color:#f8f8f2;padding:32px;" +
      "font:14px/1.5 ui-monospace,Menlo,Consolas,monospace";

    const title = document.createElement("h2");
    title.textContent = "Runtime Error";
    title.style.cssText = "color:#ff5555;margin:0 0 16px";

    const body = document.createElement("pre");
    body.textContent = stack ? message + "\n\n" + stack : message;
    body.style.cssText = "white-space:pre-wrap;margin:0";

    const close = document.createElement("button");
    close.textContent = "Dismiss";
    close.style.cssText = "margin-top:24px;padding:6px 14px;cursor:pointer";
    close.onclick = hide;

    root.append(title, body, close);
    document.body.appendChild(root);
  }

  window.__isleOverlay = { show, hide };
})();
"#;
