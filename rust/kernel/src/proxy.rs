// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Proxy meshes rigidly attached to a vertex.
//!
//! A proxy carries a triangle mesh in local coordinates. Its world transform
//! is `translation(vertex) * rotation * scale(size)` and follows the vertex
//! whenever it moves.

use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};
use smallvec::SmallVec;

use crate::construction::GeometryInfo;
use crate::error::{Error, Result};
use crate::keys::*;
use crate::model::{GeometryBase, ModelData, ProxyGeometry};

/// Triangle mesh in proxy-local coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProxyMesh {
    pub positions: Vec<Point3<f64>>,
    /// Either empty or one normal per position.
    pub normals: Vec<Vector3<f64>>,
    /// Triangle list indices into `positions`.
    pub indices: Vec<u32>,
}

impl ProxyMesh {
    /// Checks the triangle list against the vertex data.
    pub fn validate(&self) -> Result<()> {
        if self.indices.len() % 3 != 0 {
            return Err(Error::InvalidMesh(format!(
                "index count {} is not a multiple of 3",
                self.indices.len()
            )));
        }
        if !self.normals.is_empty() && self.normals.len() != self.positions.len() {
            return Err(Error::InvalidMesh(format!(
                "{} normals for {} positions",
                self.normals.len(),
                self.positions.len()
            )));
        }
        if let Some(i) = self
            .indices
            .iter()
            .find(|i| **i as usize >= self.positions.len())
        {
            return Err(Error::InvalidMesh(format!("index {i} out of range")));
        }
        Ok(())
    }

    /// Axis-aligned unit cube centered at the origin.
    pub fn unit_cube() -> Self {
        let positions = [
            (-0.5, -0.5, -0.5),
            (0.5, -0.5, -0.5),
            (0.5, 0.5, -0.5),
            (-0.5, 0.5, -0.5),
            (-0.5, -0.5, 0.5),
            (0.5, -0.5, 0.5),
            (0.5, 0.5, 0.5),
            (-0.5, 0.5, 0.5),
        ]
        .iter()
        .map(|&(x, y, z)| Point3::new(x, y, z))
        .collect();
        #[rustfmt::skip]
        let indices = vec![
            0, 2, 1, 0, 3, 2, // bottom
            4, 5, 6, 4, 6, 7, // top
            0, 1, 5, 0, 5, 4, // front
            2, 3, 7, 2, 7, 6, // back
            1, 2, 6, 1, 6, 5, // right
            3, 0, 4, 3, 4, 7, // left
        ];
        Self {
            positions,
            normals: Vec::new(),
            indices,
        }
    }
}

impl ModelData {
    /// Attaches a proxy mesh to a vertex.
    pub fn add_proxy(
        &mut self,
        info: GeometryInfo,
        vertex: VertexKey,
        mesh: ProxyMesh,
        size: Vector3<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> Result<ProxyKey> {
        self.require_layer(info.layer)?;
        if !self.vertices.contains_key(vertex) {
            return Err(Error::MissingGeometry(vertex.into()));
        }
        mesh.validate()?;
        let id = self.claim_id(info.id)?;

        let key = self.proxies.insert(ProxyGeometry {
            base: GeometryBase::new(id, &info.name_format, info.layer),
            vertex,
            size,
            rotation,
            positions: mesh.positions,
            normals: mesh.normals,
            indices: mesh.indices,
            transform: Matrix4::identity(),
        });
        if let Some(v) = self.vertices.get_mut(vertex) {
            v.proxies.push(key);
        }

        if info.is_loaded() {
            self.underived.insert(key.into());
        } else {
            self.update_proxy_transform(key);
        }
        self.geometry_added(key.into())?;
        Ok(key)
    }

    /// Replaces the mesh of a proxy.
    pub fn set_proxy_mesh(&mut self, key: ProxyKey, mesh: ProxyMesh) -> Result<()> {
        mesh.validate()?;
        let proxy = self
            .proxies
            .get_mut(key)
            .ok_or(Error::MissingGeometry(key.into()))?;
        proxy.positions = mesh.positions;
        proxy.normals = mesh.normals;
        proxy.indices = mesh.indices;
        self.notify_geometry_changed(key.into())
    }

    /// Changes size and rotation of a proxy.
    pub fn set_proxy_transform(
        &mut self,
        key: ProxyKey,
        size: Vector3<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> Result<()> {
        let proxy = self
            .proxies
            .get_mut(key)
            .ok_or(Error::MissingGeometry(key.into()))?;
        proxy.size = size;
        proxy.rotation = rotation;
        self.notify_geometry_changed(key.into())
    }

    /// Moves a proxy to another vertex.
    pub fn set_proxy_vertex(&mut self, key: ProxyKey, vertex: VertexKey) -> Result<()> {
        if !self.vertices.contains_key(vertex) {
            return Err(Error::MissingGeometry(vertex.into()));
        }
        let proxy = self
            .proxies
            .get_mut(key)
            .ok_or(Error::MissingGeometry(key.into()))?;
        let old = std::mem::replace(&mut proxy.vertex, vertex);
        if let Some(v) = self.vertices.get_mut(old) {
            v.proxies.retain(|p| *p != key);
        }
        if let Some(v) = self.vertices.get_mut(vertex) {
            v.proxies.push(key);
        }
        self.notify_topology_changed(key.into())
    }

    /// Mesh positions of a proxy in world coordinates.
    pub fn proxy_world_positions(&self, key: ProxyKey) -> Option<Vec<Point3<f64>>> {
        let proxy = self.proxies.get(key)?;
        Some(
            proxy
                .positions
                .iter()
                .map(|p| proxy.transform.transform_point(p))
                .collect(),
        )
    }

    /// Proxies attached to a vertex.
    pub fn vertex_proxies(&self, key: VertexKey) -> SmallVec<[ProxyKey; 1]> {
        self.vertices
            .get(key)
            .map(|v| v.proxies.clone())
            .unwrap_or_default()
    }

    /// Recomputes the world transform of a proxy.
    pub(crate) fn update_proxy_transform(&mut self, key: ProxyKey) {
        let Some(proxy) = self.proxies.get(key) else {
            return;
        };
        let Some(position) = self.vertex_point(proxy.vertex) else {
            return;
        };
        let transform = Matrix4::new_translation(&position.coords)
            * proxy.rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&proxy.size);
        if let Some(proxy) = self.proxies.get_mut(key) {
            proxy.transform = transform;
        }
    }
}
