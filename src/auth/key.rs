//! Opaque handles to asymmetric signing keys.

// std
use std::any::Any;
// self
use crate::_prelude::*;

/// Opaque reference to an asymmetric key that DPoP proofs are signed with.
///
/// The handle deliberately does not implement `Clone`: it is created once, shared behind an
/// [`Arc`], and only lent by reference to the signing and refresh capabilities. Key material
/// is stored type-erased; signers recover it through [`KeyHandle::downcast_ref`].
pub struct KeyHandle {
	label: String,
	material: Box<dyn Any + Send + Sync>,
}
impl KeyHandle {
	/// Wraps key material under a human-readable label (e.g. a JWK thumbprint or `kid`).
	pub fn new<K>(label: impl Into<String>, material: K) -> Self
	where
		K: 'static + Send + Sync,
	{
		Self { label: label.into(), material: Box::new(material) }
	}

	/// Label used in logs and debug output.
	pub fn label(&self) -> &str {
		&self.label
	}

	/// Borrows the key material as `K`, if that is the type it was created with.
	pub fn downcast_ref<K>(&self) -> Option<&K>
	where
		K: 'static,
	{
		self.material.downcast_ref()
	}
}
impl Debug for KeyHandle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("KeyHandle").field("label", &self.label).finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn downcast_recovers_material_of_the_original_type_only() {
		let handle = KeyHandle::new("kid-1", [7_u8; 32]);

		assert_eq!(handle.downcast_ref::<[u8; 32]>(), Some(&[7_u8; 32]));
		assert!(handle.downcast_ref::<String>().is_none());
		assert_eq!(format!("{handle:?}"), "KeyHandle { label: \"kid-1\", .. }");
	}
}
