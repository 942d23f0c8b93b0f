use lore_analysis::{ComponentDetector, DebtConfig, TechDebtDetector, ThreatConfig, ThreatModeler};
use lore_decisions::{DecisionExtractor, ReconcileThresholds, Reconciler};
use lore_protocol::{ComponentKind, CoverageOutcome, ThreatCategory};
use lore_scanner::{ScanOptions, SourceSet};
use std::fs;
use tempfile::tempdir;

#[test]
fn service_with_datastore_is_fully_covered() {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("src/api")).unwrap();
    fs::write(
        root.join("requirements.txt"),
        "fastapi==0.110\npsycopg2-binary==2.9\n",
    )
    .unwrap();
    fs::write(
        root.join("src/api/app.py"),
        "from fastapi import FastAPI\nimport logging\n\napp = FastAPI()\nDSN = \"postgresql://app:hunter22@db/app?sslmode=disable\"\n\n# TODO: paginate\n@app.get(\"/users\")\ndef users():\n    logging.info(\"list\")\n",
    )
    .unwrap();

    let sources = SourceSet::load(root, &ScanOptions::default()).unwrap();
    let extraction = DecisionExtractor::new().extract(&sources);
    let reconciled = Reconciler::new(ReconcileThresholds::default())
        .unwrap()
        .reconcile(&extraction.existing, &extraction.inferred)
        .unwrap();

    let components = ComponentDetector::default().detect(&sources, &extraction.inferred);
    let external = components.get("component:ext:postgresql").unwrap();
    assert_eq!(external.kind, ComponentKind::Datastore);
    assert!(components
        .data_flows
        .iter()
        .any(|f| f.from == "component:src/api" && f.to == "component:ext:postgresql"));

    let model = ThreatModeler::new(ThreatConfig::default())
        .unwrap()
        .model(&sources, &components, &reconciled.records)
        .unwrap();
    assert_eq!(
        model.coverage.len(),
        model.components.len() * ThreatCategory::ALL.len()
    );
    let api_info = model
        .coverage
        .iter()
        .find(|c| {
            c.component_id == "component:src/api"
                && c.category == ThreatCategory::InformationDisclosure
        })
        .unwrap();
    assert!(matches!(api_info.outcome, CoverageOutcome::Finding { .. }));

    let debt = TechDebtDetector::new(DebtConfig::default())
        .unwrap()
        .detect(&sources, &components);
    assert_eq!(debt.items.len(), 1);
    assert_eq!(debt.items[0].file, "src/api/app.py");
    assert_eq!(debt.items[0].line, 7);
}
