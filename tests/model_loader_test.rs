mod common;

use std::io::Cursor;

use boop::{
    SceneConfigurator,
    data_structures::model::Material,
    resources::{
        AssetLoader, FileLoader, load_model_glb, load_model_obj, mtl_path_for, sibling_path,
        split_path,
    },
};
use futures::{executor::block_on, future::join_all};

use crate::common::test_utils::{MemoryLoader, assert_close};

const TRIANGLE_OBJ: &str = "\
o Triangle
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
usemtl red
f 1/1 2/2 3/3
";

const RED_MTL: &str = "\
newmtl red
Kd 1 0 0
";

fn png_bytes(color: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba(color));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// A packed glTF with one node at (1, 2, 3) whose mesh has a green and an unassigned primitive.
fn triangle_glb() -> Vec<u8> {
    let json = r#"{
        "asset": {"version": "2.0"},
        "scene": 0,
        "scenes": [{"name": "Tri", "nodes": [0]}],
        "nodes": [{"mesh": 0, "translation": [1.0, 2.0, 3.0]}],
        "meshes": [{
            "name": "tri",
            "primitives": [
                {"attributes": {"POSITION": 0, "TEXCOORD_0": 1}, "material": 0},
                {"attributes": {"POSITION": 0}}
            ]
        }],
        "materials": [{
            "name": "green",
            "pbrMetallicRoughness": {"baseColorFactor": [0.0, 1.0, 0.0, 1.0]}
        }],
        "buffers": [{"byteLength": 60}],
        "bufferViews": [
            {"buffer": 0, "byteOffset": 0, "byteLength": 36},
            {"buffer": 0, "byteOffset": 36, "byteLength": 24}
        ],
        "accessors": [
            {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
             "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]},
            {"bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC2"}
        ]
    }"#;

    let floats: [f32; 15] = [
        0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, // positions
        0.0, 0.0, 1.0, 0.0, 0.5, 1.0, // tex coords
    ];
    let bin: Vec<u8> = bytemuck::cast_slice(&floats).to_vec();

    let mut json = json.as_bytes().to_vec();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend_from_slice(&json);
    glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"BIN\0");
    glb.extend_from_slice(&bin);
    glb
}

fn triangle_loader() -> MemoryLoader {
    MemoryLoader::new()
        .with_file("models/tri.obj", TRIANGLE_OBJ)
        .with_file("models/tri.mtl", RED_MTL)
        .with_file("models/tri.glb", triangle_glb())
}

#[test]
fn obj_loads_with_its_material_library() {
    let loader = triangle_loader();
    let model = block_on(load_model_obj(&loader, "models/tri.obj")).unwrap();

    assert_eq!(model.name, "OBJ");
    assert_eq!(loader.requests(), vec!["models/tri.mtl", "models/tri.obj"]);
    assert_eq!(model.meshes.len(), 1);
    assert_eq!(model.triangle_count(), 1);

    let mesh = &model.meshes[0];
    assert_eq!(mesh.vertices.len(), 3);
    let material = model.material_for(mesh).unwrap();
    assert_eq!(material.name, "red");
    assert_eq!(material.diffuse, [1.0, 0.0, 0.0]);
    assert!(material.diffuse_texture.is_none());
}

#[test]
fn obj_without_normals_gets_face_normals() {
    let loader = triangle_loader();
    let model = block_on(load_model_obj(&loader, "models/tri.obj")).unwrap();

    for vertex in &model.meshes[0].vertices {
        assert_close(vertex.normal[0], 0.0);
        assert_close(vertex.normal[1], 0.0);
        assert_close(vertex.normal[2], 1.0);
    }
}

#[test]
fn obj_tex_coords_are_flipped_vertically() {
    let loader = triangle_loader();
    let model = block_on(load_model_obj(&loader, "models/tri.obj")).unwrap();

    let mesh = &model.meshes[0];
    let top = mesh
        .vertices
        .iter()
        .find(|v| v.position == [0.0, 1.0, 0.0])
        .unwrap();
    assert_eq!(top.tex_coords, [0.0, 0.0]);
}

#[test]
fn obj_without_material_library_fails() {
    let loader = MemoryLoader::new().with_file("models/tri.obj", TRIANGLE_OBJ);

    let err = block_on(load_model_obj(&loader, "models/tri.obj")).unwrap_err();

    assert!(format!("{:#}", err).contains("models/tri.mtl"));
    // The mesh is not fetched once the library is missing.
    assert_eq!(loader.requests(), vec!["models/tri.mtl"]);
}

#[test]
fn obj_missing_texture_is_skipped() {
    let loader = MemoryLoader::new()
        .with_file("models/tri.obj", TRIANGLE_OBJ)
        .with_file("models/tri.mtl", format!("{}map_Kd missing.png\n", RED_MTL));

    let model = block_on(load_model_obj(&loader, "models/tri.obj")).unwrap();

    assert!(model.materials[0].diffuse_texture.is_none());
    assert!(loader.requests().contains(&"models/missing.png".to_string()));
}

#[test]
fn obj_texture_is_decoded_relative_to_the_model() {
    let loader = MemoryLoader::new()
        .with_file("models/tri.obj", TRIANGLE_OBJ)
        .with_file("models/tri.mtl", format!("{}map_Kd wood.png\n", RED_MTL))
        .with_file("models/wood.png", png_bytes([10, 200, 30, 255]));

    let model = block_on(load_model_obj(&loader, "models/tri.obj")).unwrap();

    let texture = model.materials[0].diffuse_texture.as_ref().unwrap();
    assert_eq!(texture.dimensions(), (2, 2));
    assert_eq!(texture.get_pixel(1, 1).0, [10, 200, 30, 255]);
}

#[test]
fn glb_flattens_its_default_scene() {
    let loader = triangle_loader();
    let model = block_on(load_model_glb(&loader, "models/tri.glb")).unwrap();

    assert_eq!(model.name, "Tri");
    assert_eq!(model.meshes.len(), 2);
    let expected = cgmath::Matrix4::from_translation(cgmath::Vector3::new(1.0, 2.0, 3.0));
    for mesh in &model.meshes {
        assert_eq!(mesh.transform, expected);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_close(mesh.vertices[0].normal[2], 1.0);
    }
}

#[test]
fn glb_primitives_without_material_use_the_default() {
    let loader = triangle_loader();
    let model = block_on(load_model_glb(&loader, "models/tri.glb")).unwrap();

    assert_eq!(model.materials.len(), 2);
    assert_eq!(model.materials[0].name, "green");
    assert_eq!(model.materials[0].diffuse, [0.0, 1.0, 0.0]);
    assert_eq!(model.materials[1], Material::default());
    assert_eq!(model.meshes[0].material, 0);
    assert_eq!(model.meshes[1].material, 1);
}

#[test]
fn glb_tex_coords_are_kept_as_stored() {
    let loader = triangle_loader();
    let model = block_on(load_model_glb(&loader, "models/tri.glb")).unwrap();

    let uvs: Vec<[f32; 2]> = model.meshes[0]
        .vertices
        .iter()
        .map(|v| v.tex_coords)
        .collect();
    assert_eq!(uvs, vec![[0.0, 0.0], [1.0, 0.0], [0.5, 1.0]]);
}

#[test]
fn glb_that_is_not_gltf_fails() {
    let loader = MemoryLoader::new().with_file("broken.glb", b"not a model".to_vec());

    assert!(block_on(load_model_glb(&loader, "broken.glb")).is_err());
}

#[test]
fn configurator_inserts_finished_models() {
    let mut config = SceneConfigurator::new(triangle_loader());
    config
        .load("model-obj: models/tri.obj\nmodel-glb: models/tri.glb\nmodel-obj: models/gone.obj")
        .unwrap();

    block_on(join_all(config.take_asset_tasks()));
    let outcomes = config.apply_completed_loads();

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 2);
    let failed: Vec<&str> = outcomes
        .iter()
        .filter_map(|o| o.as_ref().err().map(|(request, _)| request.path.as_str()))
        .collect();
    assert_eq!(failed, vec!["models/gone.obj"]);

    let models = config.scene().model_group().models();
    assert_eq!(models.len(), 2);
    assert!(models.iter().any(|m| m.name == "OBJ"));
    assert!(models.iter().any(|m| m.name == "Tri"));

    // Drained.
    assert!(config.apply_completed_loads().is_empty());
}

#[test]
fn completed_loads_are_applied_as_they_finish() {
    let mut config = SceneConfigurator::new(triangle_loader());
    config
        .load("model-glb: models/tri.glb\nmodel-obj: models/tri.obj")
        .unwrap();
    let mut tasks = config.take_asset_tasks().into_iter();

    assert!(config.apply_completed_loads().is_empty());
    block_on(tasks.next().unwrap());
    let first = config.apply_completed_loads();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].as_ref().unwrap().path, "models/tri.glb");
    assert_eq!(config.scene().model_group().models().len(), 1);

    block_on(tasks.next().unwrap());
    assert_eq!(config.apply_completed_loads().len(), 1);
    assert_eq!(config.scene().model_group().models().len(), 2);
}

#[test]
fn asset_paths_resolve_next_to_the_model() {
    assert_eq!(mtl_path_for("models/cube.obj"), "models/cube.mtl");
    assert_eq!(mtl_path_for("cube"), "cube.mtl");
    assert_eq!(mtl_path_for("v1.2/cube.final.obj"), "v1.2/cube.final.mtl");
    assert_eq!(split_path("a/b/c.glb"), ("a/b/", "c.glb"));
    assert_eq!(split_path("c.glb"), ("", "c.glb"));
    assert_eq!(sibling_path("models/cube.obj", "wood.png"), "models/wood.png");
}

#[tokio::test]
async fn file_loader_reads_from_its_root() {
    let root = std::env::temp_dir().join(format!("boop-file-loader-{}", std::process::id()));
    tokio::fs::create_dir_all(root.join("scenes")).await.unwrap();
    tokio::fs::write(root.join("scenes/a.txt"), "background-color: #000000")
        .await
        .unwrap();
    let loader = FileLoader::new(root.to_string_lossy());

    let text = loader.load_string("scenes/a.txt").await.unwrap();
    let bytes = loader.load_binary("scenes/a.txt").await.unwrap();
    let missing = loader.load_string("scenes/missing.txt").await;

    tokio::fs::remove_dir_all(&root).await.unwrap();
    assert_eq!(text, "background-color: #000000");
    assert_eq!(bytes, text.as_bytes());
    assert!(missing.is_err());
}
