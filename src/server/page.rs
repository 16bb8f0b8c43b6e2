// Upload page served at `/`

pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Image-to-3D Conversion</title>
<style>
  body { font-family: sans-serif; max-width: 760px; margin: 2rem auto; padding: 0 1rem; color: #222; }
  img { max-width: 100%; display: block; margin: .5rem 0; }
  figcaption { font-size: .85rem; color: #666; }
  progress { width: 100%; }
  #viewer { width: 100%; height: 420px; border: 0; }
  #steps { font-size: .9rem; color: #444; padding-left: 1.2rem; }
  #steps time { color: #888; margin-right: .5rem; }
  .hidden { display: none; }
  .error { color: #b00020; }
  footer { margin-top: 2rem; font-size: .85rem; color: #666; }
</style>
</head>
<body>
<h1>Image-to-3D Conversion</h1>

<label for="file">Choose an image...</label>
<input id="file" type="file" accept="image/png,image/jpeg">

<figure id="uploaded-fig" class="hidden">
  <img id="uploaded" alt="Uploaded Image">
  <figcaption>Uploaded Image</figcaption>
</figure>

<progress id="progress" class="hidden"></progress>
<ol id="steps" class="hidden"></ol>
<p id="status"></p>

<figure id="converted-fig" class="hidden">
  <img id="converted" alt="Converted Image">
  <figcaption>Converted Image</figcaption>
</figure>

<section id="result" class="hidden">
  <h2>3D Model Viewer</h2>
  <iframe id="viewer" title="3D Model Viewer"></iframe>
  <p><a id="download" download="model.obj">Download OBJ file</a></p>
</section>

<footer>Note: This app uses the SDXL-Turbo-Img2Img-CPU and InstantMesh models from Hugging Face Spaces.</footer>

<script>
  const el = (id) => document.getElementById(id);
  const show = (id, on) => el(id).classList.toggle('hidden', !on);

  const renderSteps = (progress) => {
    const list = el('steps');
    list.replaceChildren();
    for (const p of progress || []) {
      const item = document.createElement('li');
      const at = document.createElement('time');
      at.dateTime = p.at;
      at.textContent = new Date(p.at).toLocaleTimeString();
      item.append(at, Math.round(p.fraction * 100) + '% ' + p.message);
      item.dataset.stage = p.stage;
      list.append(item);
    }
    show('steps', list.children.length > 0);
    const last = (progress || []).at(-1);
    if (last) {
      el('progress').value = last.fraction;
    }
  };

  el('file').addEventListener('change', async (event) => {
    const file = event.target.files[0];
    if (!file) return;

    el('uploaded').src = URL.createObjectURL(file);
    show('uploaded-fig', true);
    show('converted-fig', false);
    show('result', false);
    show('steps', false);
    el('progress').removeAttribute('value');
    el('status').textContent = 'Converting...';
    el('status').classList.remove('error');
    show('progress', true);

    try {
      const resp = await fetch('/api/convert', {
        method: 'POST',
        headers: { 'content-type': file.type || 'application/octet-stream' },
        body: file,
      });
      const data = await resp.json();
      if (!resp.ok) {
        throw new Error(data.error || ('HTTP ' + resp.status));
      }
      renderSteps(data.progress);
      el('status').textContent = data.status;
      el('status').classList.toggle('error', !data.success);
      if (data.stylized_png_base64) {
        el('converted').src = 'data:image/png;base64,' + data.stylized_png_base64;
        show('converted-fig', true);
      }
      if (data.success) {
        el('viewer').srcdoc = data.viewer_html;
        el('download').href = data.download_url;
        show('result', true);
      }
    } catch (err) {
      el('status').textContent = 'An error occurred: ' + err.message;
      el('status').classList.add('error');
    } finally {
      show('progress', el('progress').hasAttribute('value'));
    }
  });
</script>
</body>
</html>
"#;
