// 首页与健康检查

use axum::response::Html;
use axum::Json;
use serde::Serialize;

/// 健康检查响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
    })
}

/// GET /
///
/// 输入分享链接，在浏览器端生成 /view 与 /down 链接
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8"><meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Share Link Proxy</title>
  <style>
    body { font-family: system-ui, sans-serif; display: flex; justify-content: center; align-items: center; min-height: 100vh; margin: 0; background: #111; color: #eee; }
    .card { background: #1c1c1c; padding: 28px; border-radius: 12px; width: 100%; max-width: 540px; border: 1px solid #333; }
    input { width: 100%; padding: 12px; margin-bottom: 12px; box-sizing: border-box; background: #2a2a2a; border: 1px solid #444; color: #fff; border-radius: 6px; }
    button { width: 100%; padding: 12px; border: none; border-radius: 6px; font-weight: bold; cursor: pointer; }
    #result { display: none; margin-top: 20px; }
    .label { font-size: 11px; text-transform: uppercase; margin: 10px 0 4px; color: #6cc; }
  </style>
</head>
<body>
  <div class="card">
    <h2>Share Link Proxy</h2>
    <form id="form">
      <input type="url" id="source" placeholder="https://..." required />
      <input type="text" id="filename" placeholder="filename (optional)" />
      <button type="submit">Generate</button>
    </form>
    <div id="result">
      <div class="label">Stream</div><input type="text" id="view" readonly />
      <div class="label">Download</div><input type="text" id="down" readonly />
    </div>
  </div>
  <script>
    document.getElementById('form').onsubmit = (e) => {
      e.preventDefault();
      const encoded = btoa(document.getElementById('source').value);
      const name = document.getElementById('filename').value.trim();
      const query = name ? '?filename=' + encodeURIComponent(name) : '';
      const origin = window.location.origin;
      document.getElementById('view').value = origin + '/view/' + encoded + query;
      document.getElementById('down').value = origin + '/down/' + encoded + query;
      document.getElementById('result').style.display = 'block';
    };
  </script>
</body>
</html>
"#;
