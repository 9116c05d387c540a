//! End-to-end pipeline tests over an in-memory program snapshot.

use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tsgonest_common::config::LoadedConfig;
use tsgonest_common::loc::Loc;
use tsgonest_host::ast::{ClassDecl, Decorator, JsDocTag, MethodDecl, ParamDecl, SourceFile, TypeEntry};
use tsgonest_host::program::ProgramSnapshot;
use tsgonest_host::types::{HostObject, HostProperty, HostType, TypeId, TypeTableBuilder};
use tsgonest_pipeline::{PipelineOptions, PipelineStatus, run_pipeline};

fn dto_object(
    b: &mut TypeTableBuilder,
    name: &str,
    properties: Vec<HostProperty>,
) -> TypeId {
    let symbol = b.symbol();
    b.add(HostType::Object(HostObject {
        name: name.to_string(),
        symbol,
        type_args: Vec::new(),
        properties,
        index_signature: None,
        declared_in: "src/user.dto.ts".to_string(),
        loc: Loc::new(1, 1),
    }))
}

/// A program declaring `CreateUserDto` / `UserResponse` and a
/// `UserController` with `@Post() create(@Body() body): Promise<UserResponse>`.
fn user_program(root: &Path, with_emit: bool) -> ProgramSnapshot {
    let mut b = TypeTableBuilder::new();
    let string_ty = b.add(HostType::String);
    let number_ty = b.add(HostType::Number);

    let create_dto = dto_object(
        &mut b,
        "CreateUserDto",
        vec![
            HostProperty::required("name", string_ty).with_jsdoc(vec![
                JsDocTag::new("minLength", Some("1")),
                JsDocTag::new("maxLength", Some("255")),
            ]),
            HostProperty::required("email", string_ty)
                .with_jsdoc(vec![JsDocTag::new("format", Some("email"))]),
            HostProperty::required("age", number_ty).with_jsdoc(vec![
                JsDocTag::new("minimum", Some("0")),
                JsDocTag::new("maximum", Some("150")),
            ]),
        ],
    );
    let response_dto = dto_object(
        &mut b,
        "UserResponse",
        vec![
            HostProperty::required("id", string_ty),
            HostProperty::required("name", string_ty),
        ],
    );
    let promise = b.add(HostType::Promise(response_dto));

    let mut snapshot = ProgramSnapshot::new(b.build());
    snapshot.out_dir = Some(root.join("dist"));
    snapshot.tsconfig_path = root.join("tsconfig.json");

    let mut dto_file = SourceFile::new("src/user.dto.ts");
    dto_file.emitted_js = Some(root.join("dist/user.dto.js"));
    dto_file.exported_types = vec![
        TypeEntry {
            name: "CreateUserDto".to_string(),
            ty: create_dto,
            loc: Loc::new(1, 1),
        },
        TypeEntry {
            name: "UserResponse".to_string(),
            ty: response_dto,
            loc: Loc::new(10, 1),
        },
    ];
    snapshot.add_file(dto_file);

    let mut controller_file = SourceFile::new("src/user.controller.ts");
    controller_file.emitted_js = Some(root.join("dist/user.controller.js"));
    controller_file.classes = vec![ClassDecl {
        name: "UserController".to_string(),
        decorators: vec![Decorator::named("Controller").with_arg(json!("users"))],
        methods: vec![MethodDecl {
            name: "create".to_string(),
            decorators: vec![Decorator::named("Post")],
            params: vec![ParamDecl {
                name: "body".to_string(),
                ty: create_dto,
                decorators: vec![Decorator::named("Body")],
                loc: Loc::new(7, 20),
            }],
            return_type: promise,
            is_async_generator: false,
            doc: None,
            jsdoc: Vec::new(),
            loc: Loc::new(7, 3),
        }],
        doc: None,
        jsdoc: Vec::new(),
        loc: Loc::new(4, 1),
    }];
    snapshot.add_file(controller_file);

    if with_emit {
        snapshot.set_emitted(
            root.join("dist/user.dto.js"),
            "export {};\n",
        );
        snapshot.set_emitted(
            root.join("dist/user.controller.js"),
            "import { is } from \"tsgonest\";\nexport function guard(body) { return is<CreateUserDto>(body); }\n",
        );
    }
    snapshot
}

fn config_at(root: &Path) -> LoadedConfig {
    let path = root.join("tsgonest.json");
    std::fs::write(&path, "{}").unwrap();
    LoadedConfig::load(&path).unwrap()
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn full_run_writes_companions_manifest_and_openapi() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let program = user_program(root, true);
    let config = config_at(root);

    let result = run_pipeline(&program, &config, &PipelineOptions::default());
    assert_eq!(result.status, PipelineStatus::Success);
    assert_eq!(result.status.exit_code(), 0);

    // companions exist and export the five functions
    let companion_path = root.join("dist/user.CreateUserDto.tsgonest.js");
    let companion = std::fs::read_to_string(&companion_path).unwrap();
    for export in [
        "isCreateUserDto",
        "validateCreateUserDto",
        "assertCreateUserDto",
        "stringifyCreateUserDto",
        "schemaCreateUserDto",
    ] {
        assert!(companion.contains(export), "companion missing {export}");
    }
    assert!(root.join("dist/user.CreateUserDto.tsgonest.d.ts").exists());

    // manifest lists both types with their entry points
    let manifest = read_json(&root.join("dist/__tsgonest_manifest.json"));
    assert_eq!(manifest["version"], json!(1));
    let entry = &manifest["companions"]["CreateUserDto"];
    assert_eq!(entry["validate"], json!("validateCreateUserDto"));
    assert!(entry["file"].as_str().unwrap().ends_with("user.CreateUserDto.tsgonest.js"));

    // OpenAPI: POST /users with $ref request body and 201 response
    let openapi = read_json(&root.join("dist/openapi.json"));
    assert_eq!(openapi["openapi"], json!("3.2.0"));
    let operation = &openapi["paths"]["/users"]["post"];
    assert_eq!(
        operation["requestBody"]["content"]["application/json"]["schema"]["$ref"],
        json!("#/components/schemas/CreateUserDto")
    );
    assert_eq!(
        operation["responses"]["201"]["content"]["application/json"]["schema"]["$ref"],
        json!("#/components/schemas/UserResponse")
    );
    let schema = &openapi["components"]["schemas"]["CreateUserDto"];
    assert_eq!(schema["type"], json!("object"));
    assert_eq!(schema["required"], json!(["name", "email", "age"]));
    assert_eq!(schema["properties"]["email"]["format"], json!("email"));
    assert_eq!(schema["properties"]["age"]["minimum"], json!(0.0));
    assert_eq!(schema["properties"]["age"]["maximum"], json!(150.0));

    // marker rewrite happened in place
    let rewritten = std::fs::read_to_string(root.join("dist/user.controller.js")).unwrap();
    assert!(rewritten.starts_with("/* tsgonest:rewritten */"));
    assert!(rewritten.contains("isCreateUserDto(body)"));
    assert!(
        rewritten.contains("import { isCreateUserDto } from \"./user.CreateUserDto.tsgonest.js\";")
    );

    // cache entry written last
    assert!(root.join("dist/.tsgonest-cache").exists());
}

#[test]
fn second_run_with_no_emit_is_cached() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let config = config_at(root);

    let first = run_pipeline(&user_program(root, true), &config, &PipelineOptions::default());
    assert_eq!(first.status, PipelineStatus::Success);

    // same compile, but the compiler reports nothing emitted
    let mut second_program = user_program(root, false);
    second_program.emit.emit_skipped = true;
    let second = run_pipeline(&second_program, &config, &PipelineOptions::default());
    assert_eq!(second.status, PipelineStatus::Cached);
    assert!(second.written_files.is_empty());
    assert_eq!(second.status.exit_code(), 0);
}

#[test]
fn deleting_an_output_invalidates_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let config = config_at(root);

    run_pipeline(&user_program(root, true), &config, &PipelineOptions::default());
    std::fs::remove_file(root.join("dist/user.CreateUserDto.tsgonest.js")).unwrap();

    let mut program = user_program(root, false);
    program.emit.emit_skipped = true;
    let result = run_pipeline(&program, &config, &PipelineOptions::default());
    assert_eq!(result.status, PipelineStatus::Success);
    assert!(root.join("dist/user.CreateUserDto.tsgonest.js").exists());
}

#[test]
fn controllers_never_get_companions() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let config = config_at(root);

    // export the controller class itself as a type entry
    let mut program = user_program(root, true);
    let controller_ty = {
        let file = &program.files[1];
        file.classes[0].methods[0].params[0].ty
    };
    program.files[1].exported_types.push(TypeEntry {
        name: "UserController".to_string(),
        ty: controller_ty,
        loc: Loc::new(4, 1),
    });

    let result = run_pipeline(&program, &config, &PipelineOptions::default());
    assert_eq!(result.status, PipelineStatus::Success);
    let companions: Vec<PathBuf> = std::fs::read_dir(root.join("dist"))
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains("UserController") && n.contains("tsgonest"))
        })
        .collect();
    assert!(companions.is_empty(), "controller got a companion: {companions:?}");
}

#[test]
fn identical_inputs_produce_identical_bytes() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();

    for (root, other) in [(dir_a.path(), dir_b.path()), (dir_b.path(), dir_a.path())] {
        let _ = other;
        let config = config_at(root);
        let result = run_pipeline(&user_program(root, true), &config, &PipelineOptions::default());
        assert_eq!(result.status, PipelineStatus::Success);
    }

    for file in [
        "dist/user.CreateUserDto.tsgonest.js",
        "dist/user.UserResponse.tsgonest.js",
        "dist/openapi.json",
    ] {
        let a = std::fs::read(dir_a.path().join(file)).unwrap();
        let b = std::fs::read(dir_b.path().join(file)).unwrap();
        assert_eq!(a, b, "{file} differs between identical runs");
    }
    // the manifest embeds absolute companion paths, so compare it with the
    // roots normalized out
    let normalize = |root: &Path| {
        std::fs::read_to_string(root.join("dist/__tsgonest_manifest.json"))
            .unwrap()
            .replace(&root.display().to_string().replace('\\', "/"), "<root>")
    };
    assert_eq!(normalize(dir_a.path()), normalize(dir_b.path()));
}

#[test]
fn compiler_errors_abort_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let config = config_at(root);

    let mut program = user_program(root, true);
    program.diagnostics.push(tsgonest_common::diagnostics::Diagnostic::error(
        "src/user.dto.ts",
        Loc::new(3, 1),
        "Cannot find name 'Strng'.".to_string(),
        2304,
    ));
    let result = run_pipeline(&program, &config, &PipelineOptions::default());
    assert_eq!(result.status, PipelineStatus::Failed);
    assert_eq!(result.status.exit_code(), 1);
    assert!(!root.join("dist/__tsgonest_manifest.json").exists());
    assert!(!root.join("dist/.tsgonest-cache").exists());
}

#[test]
fn interrupt_skips_cache_write() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let config = config_at(root);

    let flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true));
    let options = PipelineOptions {
        strict: false,
        interrupt: Some(flag),
    };
    let result = run_pipeline(&user_program(root, true), &config, &options);
    assert_eq!(result.status, PipelineStatus::Interrupted);
    assert_eq!(result.status.exit_code(), 130);
    assert!(!root.join("dist/.tsgonest-cache").exists());
}
