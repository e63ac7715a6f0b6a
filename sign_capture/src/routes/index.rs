use axum::response::Html;

const INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Sign capture</title>
</head>
<body>
  <img id="overlay" src="/video_feed" width="640" height="480" alt="overlay">
  <div id="prediction">Prediction: ...</div>
  <button id="start-btn">Start</button>
  <button id="stop-btn">Stop</button>
  <script>
    const predictionDiv = document.getElementById('prediction');
    const overlay = document.getElementById('overlay');

    async function control(action) {
      const res = await fetch('/' + action, { method: 'POST' });
      if (!res.ok) {
        predictionDiv.innerText = await res.text();
        return;
      }
      const data = await res.json();
      predictionDiv.innerText = data.text;
      if (action === 'start') overlay.src = '/video_feed?' + Date.now();
    }

    document.getElementById('start-btn').onclick = () => control('start');
    document.getElementById('stop-btn').onclick = () => control('stop');

    setInterval(async () => {
      try {
        const res = await fetch('/prediction');
        const data = await res.json();
        predictionDiv.innerText = data.text;
      } catch (err) {
        console.error('Prediction poll error:', err);
      }
    }, 300);
  </script>
</body>
</html>
"#;

pub async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}
