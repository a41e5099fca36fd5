use anyhow::{Context as _, anyhow};
use cgmath::SquareMatrix;

use crate::{
    data_structures::model::{self, ModelVertex},
    resources::{
        AssetLoader, decode_texture, load_texture_or_skip, obj::compute_normals, sibling_path,
        split_path,
    },
};

/**
 * Loads a packed glTF asset (`.glb`) and flattens its default scene into one model.
 *
 * Node transforms are baked into each mesh's `transform`, so the model can be
 * placed in the model group like any other. External buffers and images are
 * fetched relative to the asset.
 */
pub async fn load_model_glb(loader: &impl AssetLoader, path: &str) -> anyhow::Result<model::Model> {
    let bytes = loader
        .load_binary(path)
        .await
        .with_context(|| format!("Failed to load glb {}", path))?;
    let gltf = gltf::Gltf::from_slice(&bytes).with_context(|| format!("Failed to parse glb {}", path))?;

    // Load buffers
    let mut buffer_data: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .ok_or_else(|| anyhow!("{} references a binary chunk it does not contain", path))?;
                buffer_data.push(blob.into());
            }
            gltf::buffer::Source::Uri(uri) => {
                let bin = loader.load_binary(&sibling_path(path, uri)).await?;
                buffer_data.push(bin);
            }
        }
    }

    // Decode images once, materials may share them
    let mut images = Vec::new();
    for image in gltf.images() {
        let decoded = match image.source() {
            gltf::image::Source::View { view, mime_type: _ } => {
                let start = view.offset();
                let end = start + view.length();
                match buffer_data
                    .get(view.buffer().index())
                    .and_then(|data| data.get(start..end))
                {
                    Some(slice) => match decode_texture(slice, path) {
                        Ok(img) => Some(img),
                        Err(e) => {
                            log::warn!("Embedded image {} in {} is skipped: {:#}", image.index(), path, e);
                            None
                        }
                    },
                    None => {
                        log::warn!("Embedded image {} in {} points outside its buffer", image.index(), path);
                        None
                    }
                }
            }
            gltf::image::Source::Uri { uri, mime_type: _ } => {
                load_texture_or_skip(loader, &sibling_path(path, uri)).await
            }
        };
        images.push(decoded);
    }

    // Load materials. The last entry stands in for primitives without one.
    let mut materials: Vec<model::Material> = gltf
        .materials()
        .map(|material| {
            let pbr = material.pbr_metallic_roughness();
            let [r, g, b, _] = pbr.base_color_factor();
            let diffuse_texture = pbr
                .base_color_texture()
                .and_then(|info| images.get(info.texture().source().index()).cloned().flatten());
            model::Material {
                name: material.name().unwrap_or("material").to_string(),
                diffuse: [r, g, b],
                diffuse_texture,
            }
        })
        .collect();
    let default_material = materials.len();
    materials.push(model::Material::default());

    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .ok_or_else(|| anyhow!("{} contains no scene", path))?;

    let mut meshes = Vec::new();
    for node in scene.nodes() {
        collect_meshes(
            node,
            cgmath::Matrix4::identity(),
            &buffer_data,
            default_material,
            &mut meshes,
        );
    }

    let name = scene
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| split_path(path).1.to_string());

    Ok(model::Model {
        name,
        meshes,
        materials,
    })
}

fn collect_meshes(
    node: gltf::Node,
    parent: cgmath::Matrix4<f32>,
    buffer_data: &[Vec<u8>],
    default_material: usize,
    meshes: &mut Vec<model::Mesh>,
) {
    let transform = parent * cgmath::Matrix4::from(node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if !matches!(primitive.mode(), gltf::mesh::Mode::Triangles) {
                log::warn!(
                    "Skipping primitive {} of mesh {:?}: only triangle lists are supported",
                    primitive.index(),
                    mesh.name()
                );
                continue;
            }
            let reader = primitive.reader(|buffer| buffer_data.get(buffer.index()).map(Vec::as_slice));

            let mut vertices: Vec<ModelVertex> = match reader.read_positions() {
                Some(positions) => positions
                    .map(|position| ModelVertex {
                        position,
                        ..Default::default()
                    })
                    .collect(),
                None => continue,
            };
            let has_normals = match reader.read_normals() {
                Some(normals) => {
                    vertices
                        .iter_mut()
                        .zip(normals)
                        .for_each(|(v, normal)| v.normal = normal);
                    true
                }
                None => false,
            };
            if let Some(tex_coords) = reader.read_tex_coords(0).map(|t| t.into_f32()) {
                vertices
                    .iter_mut()
                    .zip(tex_coords)
                    .for_each(|(v, uv)| v.tex_coords = uv);
            }
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..vertices.len() as u32).collect(),
            };
            if !has_normals {
                compute_normals(&mut vertices, &indices);
            }

            meshes.push(model::Mesh {
                name: mesh.name().unwrap_or("unknown_mesh").to_string(),
                vertices,
                indices,
                material: primitive.material().index().unwrap_or(default_material),
                transform,
            });
        }
    }

    for child in node.children() {
        collect_meshes(child, transform, buffer_data, default_material, meshes);
    }
}
