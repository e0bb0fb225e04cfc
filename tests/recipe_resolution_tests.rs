mod common;

use common::test_catalog;
use sbom_orchestrator::orchestration::RecipeResolver;
use sbom_orchestrator::OrchestratorError;

fn resolver() -> RecipeResolver {
    RecipeResolver::from_catalog(&test_catalog()).expect("resolver builds")
}

#[test]
fn test_rpm_recipe_is_stable() {
    let resolver = resolver();

    for _ in 0..3 {
        let recipe = resolver.resolve("RPM").unwrap();
        assert_eq!(recipe.generator.name, "cyclonedx-maven-plugin");
        assert_eq!(recipe.generator.version, "2.7.9");
        assert_eq!(recipe.enhancers.len(), 1);
        assert_eq!(recipe.enhancers[0].name, "rpm-enhancer");
        assert_eq!(recipe.enhancers[0].version, "1.0.0");
    }
}

#[test]
fn test_container_image_has_no_enhancers() {
    let recipe = resolver().resolve("CONTAINER_IMAGE").unwrap();
    assert_eq!(recipe.generator.name, "syft-generator");
    assert_eq!(recipe.generator.version, "1.5.0");
    assert_eq!(
        recipe.generator.options.get("format").map(String::as_str),
        Some("cyclonedx-json")
    );
    assert!(recipe.enhancers.is_empty());
}

#[test]
fn test_resolution_ignores_case() {
    let resolver = resolver();
    let canonical = resolver.resolve("RPM").unwrap();
    assert_eq!(resolver.resolve("rpm").unwrap(), canonical);
    assert_eq!(resolver.resolve("Rpm").unwrap(), canonical);
}

#[test]
fn test_unknown_type_fails() {
    let err = resolver().resolve("UNKNOWN").unwrap_err();
    assert!(matches!(err, OrchestratorError::UnknownTargetType(_)));
    assert_eq!(err.http_status(), 400);

    assert!(matches!(
        resolver().resolve(""),
        Err(OrchestratorError::UnknownTargetType(_))
    ));
}

#[test]
fn test_enhancer_order_follows_catalog() {
    let recipe = resolver().resolve("chain").unwrap();
    let names: Vec<&str> = recipe.enhancers.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["first-enhancer", "second-enhancer", "third-enhancer"]);
}
