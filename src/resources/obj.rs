use std::io::{BufReader, Cursor};

use anyhow::Context as _;
use cgmath::{InnerSpace, SquareMatrix, Zero};

use crate::{
    data_structures::model::{self, ModelVertex},
    resources::{AssetLoader, load_texture_or_skip, mtl_path_for, sibling_path, split_path},
};

/// Name given to every model loaded from an OBJ file.
pub const OBJ_MODEL_NAME: &str = "OBJ";

/**
 * Loads an OBJ mesh together with the material library next to it.
 *
 * The material library is always `<stem>.mtl` in the OBJ's directory, whatever
 * `mtllib` lines the OBJ itself contains. A missing or broken material library
 * fails the whole load; a missing texture only drops that texture.
 */
pub async fn load_model_obj(loader: &impl AssetLoader, obj_path: &str) -> anyhow::Result<model::Model> {
    let mtl_path = mtl_path_for(obj_path);
    let mtl_text = loader
        .load_string(&mtl_path)
        .await
        .with_context(|| format!("Failed to load mtl {}", mtl_path))?;
    // Validate up front so a broken library fails before the mesh is fetched.
    tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mtl_text.as_bytes())))
        .with_context(|| format!("Failed to parse mtl {}", mtl_path))?;

    let obj_text = loader
        .load_string(obj_path)
        .await
        .with_context(|| format!("Failed to load obj {}", obj_path))?;
    let obj_text = with_material_library(&obj_text, split_path(&mtl_path).1);
    let mut obj_reader = BufReader::new(Cursor::new(obj_text));

    let (models, obj_materials) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |_| {
            let mat_text = mtl_text.clone();
            async move { tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mat_text))) }
        },
    )
    .await
    .with_context(|| format!("Failed to parse obj {}", obj_path))?;

    let mut materials = Vec::new();
    for m in obj_materials? {
        let diffuse_texture = match &m.diffuse_texture {
            Some(texture) => load_texture_or_skip(loader, &sibling_path(obj_path, texture)).await,
            None => None,
        };
        materials.push(model::Material {
            name: m.name.clone(),
            diffuse: m.diffuse.unwrap_or([1.0; 3]),
            diffuse_texture,
        });
    }

    let meshes = models.iter().map(to_mesh).collect();

    Ok(model::Model {
        name: OBJ_MODEL_NAME.to_string(),
        meshes,
        materials,
    })
}

/// Makes sure the OBJ references the inferred material library so `usemtl` names resolve.
fn with_material_library(obj_text: &str, mtl_name: &str) -> String {
    let has_mtllib = obj_text
        .lines()
        .any(|line| line.trim_start().starts_with("mtllib"));
    if has_mtllib {
        obj_text.to_string()
    } else {
        format!("mtllib {}\n{}", mtl_name, obj_text)
    }
}

fn to_mesh(m: &tobj::Model) -> model::Mesh {
    let mut vertices = (0..m.mesh.positions.len() / 3)
        .map(|i| ModelVertex {
            position: [
                m.mesh.positions[i * 3],
                m.mesh.positions[i * 3 + 1],
                m.mesh.positions[i * 3 + 2],
            ],
            tex_coords: [
                m.mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                1.0 - m.mesh.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
            ],
            normal: [
                m.mesh.normals.get(i * 3).map_or(0.0, |f| *f),
                m.mesh.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                m.mesh.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
            ],
        })
        .collect::<Vec<_>>();

    if m.mesh.normals.is_empty() {
        compute_normals(&mut vertices, &m.mesh.indices);
    }

    model::Mesh {
        name: m.name.clone(),
        vertices,
        indices: m.mesh.indices.clone(),
        material: m.mesh.material_id.unwrap_or(usize::MAX),
        transform: cgmath::Matrix4::identity(),
    }
}

/// Smooth vertex normals from the triangles that share each vertex.
pub(crate) fn compute_normals(vertices: &mut [ModelVertex], indices: &[u32]) {
    let mut sums = vec![cgmath::Vector3::<f32>::zero(); vertices.len()];
    for c in indices.chunks_exact(3) {
        let (i0, i1, i2) = (c[0] as usize, c[1] as usize, c[2] as usize);
        if i0 >= vertices.len() || i1 >= vertices.len() || i2 >= vertices.len() {
            continue;
        }
        let pos0: cgmath::Vector3<f32> = vertices[i0].position.into();
        let pos1: cgmath::Vector3<f32> = vertices[i1].position.into();
        let pos2: cgmath::Vector3<f32> = vertices[i2].position.into();
        // Not normalised so larger triangles weigh more
        let face = (pos1 - pos0).cross(pos2 - pos0);
        sums[i0] += face;
        sums[i1] += face;
        sums[i2] += face;
    }
    for (v, sum) in vertices.iter_mut().zip(sums) {
        if sum.magnitude2() > 0.0 {
            v.normal = sum.normalize().into();
        }
    }
}
