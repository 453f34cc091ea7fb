use criterion::{Criterion, black_box, criterion_group, criterion_main};

use layerforge::extract::pipeline::{extract_pipeline_from_str, infer_inputs};
use layerforge::extract::{ImportSet, extract_imports};
use layerforge::template::{Fragments, assemble};

fn make_pipeline(processes: usize) -> String {
    let mut text = String::new();
    for i in 0..processes {
        text.push_str(&format!(
            "        # *** STAGE{i} START ***\n        # Preprocess\n        x{i} = self.stage{i}_pre(image, {i})\n        # Inference\n        y{i} = self.sess.run(None, x{i})\n        # Postprocess\n        out = self.stage{i}_post(y{i}, threshold)\n        # *** STAGE{i} END ***\n"
        ));
    }
    text
}

fn bench_extract(c: &mut Criterion) {
    let lines: Vec<String> = (0..200)
        .map(|i| match i % 4 {
            0 => format!("import mod{i}"),
            1 => format!("from pkg{i}.sub import name{i} as alias{i}"),
            2 => format!("value{i} = compute({i})"),
            _ => "    return self".to_string(),
        })
        .collect();

    c.bench_function("extract_imports 200 lines", |bch| {
        bch.iter(|| {
            let mut set = ImportSet::new();
            for line in &lines {
                let _ = extract_imports(black_box(line), &mut set);
            }
            set
        })
    });

    let pipeline = make_pipeline(50);
    c.bench_function("extract_pipeline last of 50", |bch| {
        bch.iter(|| extract_pipeline_from_str(black_box(&pipeline), "stage49"))
    });
}

fn bench_assemble(c: &mut Criterion) {
    let imports: ImportSet = (0..50).map(|i| format!("import mod{i}")).collect();
    let classes: Vec<String> = (0..500).map(|i| format!("    line_{i} = {i}")).collect();
    let pipeline = extract_pipeline_from_str(&make_pipeline(1), "stage0");
    let inputs = infer_inputs(&pipeline);
    let template = "header\n# IMPORTS GO HERE\n# TYPES GO HERE\n# CLASSES GO HERE\ndef handler(event, context):\n    # LAMBDA INPUTS GO HERE\n    # PIPELINE GOES HERE\n    return out\n";

    c.bench_function("assemble 500 class lines", |bch| {
        bch.iter(|| {
            let fragments = Fragments {
                imports: &imports,
                types: &[],
                classes: &classes,
                inputs: &inputs,
                pipeline: &pipeline,
            };
            let mut out = Vec::with_capacity(16 * 1024);
            assemble(black_box(template), &fragments, 4, &mut out).expect("assemble");
            out
        })
    });
}

criterion_group!(benches, bench_extract, bench_assemble);
criterion_main!(benches);
