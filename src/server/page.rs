//! Embedded prediction form

/// Single-page form built from `/api/schema`; posts to `/api/predict`
pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Riverbank Adaptation Prediction</title>
    <style>
        body{font-family:system-ui,sans-serif;margin:0;background:#f4f7fb;color:#1f2937}
        header{background:#1f77b4;color:#fff;padding:1rem 2rem}
        main{display:grid;grid-template-columns:260px 1fr;gap:2rem;padding:2rem}
        aside{background:#fff;border-radius:8px;padding:1rem;height:fit-content}
        form{display:grid;grid-template-columns:repeat(auto-fill,minmax(220px,1fr));gap:1rem}
        label{display:flex;flex-direction:column;font-size:.85rem;gap:.25rem}
        input,select{padding:.4rem;border:1px solid #cbd5e1;border-radius:4px}
        button{grid-column:1/-1;padding:.8rem;background:#1f77b4;color:#fff;border:0;border-radius:6px;font-size:1rem;cursor:pointer}
        #result{margin-top:2rem;background:#fff;border-radius:8px;padding:1rem;display:none}
        .bar{background:#1f77b4;height:14px;border-radius:3px}
        .error{color:#b91c1c}
        .Highly{border-left:6px solid #16a34a}.Moderately{border-left:6px solid #ca8a04}.Non-Adaptive{border-left:6px solid #dc2626}
    </style>
</head>
<body>
<header><h1>Riverbank Adaptation Prediction System</h1></header>
<main>
    <aside>
        <h3>Model Information</h3>
        <div id="model">Loading...</div>
        <h3>Prediction Categories</h3>
        <p><b>Highly Adaptive</b>: well prepared</p>
        <p><b>Moderately Adaptive</b>: some preparation</p>
        <p><b>Non-Adaptive</b>: needs attention</p>
    </aside>
    <section>
        <h2>Enter Household Information</h2>
        <form id="form"></form>
        <div id="result"></div>
    </section>
</main>
<script>
const form = document.getElementById('form');
const result = document.getElementById('result');

async function init() {
    const [schema, model] = await Promise.all([
        fetch('/api/schema').then(r => r.json()),
        fetch('/api/model').then(r => r.json()),
    ]);
    document.getElementById('model').innerHTML =
        `<p><b>Model:</b> ${model.model_name}</p>` +
        `<p><b>Accuracy:</b> ${(model.accuracy * 100).toFixed(2)}%</p>` +
        `<p><b>F1-Score:</b> ${model.f1_score.toFixed(4)}</p>`;
    for (const f of schema.features) {
        const label = document.createElement('label');
        label.textContent = f.name.replaceAll('_', ' ');
        let input;
        if (f.type === 'categorical') {
            input = document.createElement('select');
            for (const v of f.domain) input.add(new Option(v, v));
        } else {
            input = document.createElement('input');
            input.type = 'number';
            input.min = f.min;
            input.max = f.max;
            input.step = f.max <= 1 ? '0.01' : '1';
            input.value = f.max <= 1 ? '0.5' : f.min;
            input.required = true;
        }
        input.name = f.name;
        label.appendChild(input);
        form.appendChild(label);
    }
    const button = document.createElement('button');
    button.type = 'submit';
    button.textContent = 'Predict Adaptation Category';
    form.appendChild(button);
}

form.addEventListener('submit', async (e) => {
    e.preventDefault();
    const body = {};
    for (const el of form.elements) {
        if (!el.name) continue;
        body[el.name] = el.type === 'number' ? Number(el.value) : el.value;
    }
    const resp = await fetch('/api/predict', {
        method: 'POST',
        headers: {'Content-Type': 'application/json'},
        body: JSON.stringify(body),
    });
    const data = await resp.json();
    result.style.display = 'block';
    if (!resp.ok) {
        result.className = '';
        result.innerHTML = `<p class="error">${data.message}</p>`;
        return;
    }
    const p = data.prediction;
    result.className = p.label.split(' ')[0];
    result.innerHTML =
        `<h2>${p.label}</h2><p>Confidence: ${p.confidence.toFixed(2)}%</p>` +
        p.probabilities.map(c =>
            `<div>${c.category}: ${(c.probability * 100).toFixed(1)}%` +
            `<div class="bar" style="width:${c.probability * 100}%"></div></div>`).join('') +
        `<h3>Recommendations</h3><ul>${p.recommendations.map(r => `<li>${r}</li>`).join('')}</ul>`;
});

init().catch(err => {
    document.getElementById('model').innerHTML = `<p class="error">${err}</p>`;
});
</script>
</body>
</html>
"#;
