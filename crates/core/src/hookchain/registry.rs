//! Hook point registry - declared hook points and their callback lists

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use slotmap::{new_key_type, SlotMap};

use reapi_engine::ApiFlags;
use reapi_sdk::{ForwardRef, ScriptId};

use super::context::{HookArgs, MAX_HOOKCHAIN_ARGS};
use super::error::HookChainError;
use super::record::HookRecord;
use super::wire::{ArgSpec, WireType, WireValue};

new_key_type! {
    /// Handle for a registered hook callback
    pub struct HookKey;
}

/// Number of function ids reserved per group
pub const REGION_RANGE: u32 = 1024;

/// Family of hooked functions, each provided by one host API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum HookGroup {
    Engine = 0,
    GameDll,
    Animating,
    Player,
    GameRules,
    Grenade,
    WeaponBox,
    Weapon,
    Gib,
    Rechecker,
}

impl HookGroup {
    const ALL: [HookGroup; 10] = [
        Self::Engine,
        Self::GameDll,
        Self::Animating,
        Self::Player,
        Self::GameRules,
        Self::Grenade,
        Self::WeaponBox,
        Self::Weapon,
        Self::Gib,
        Self::Rechecker,
    ];

    /// Host API that must be present to hook functions of this group
    pub fn required_api(self) -> ApiFlags {
        match self {
            Self::Engine => ApiFlags::REHLDS,
            Self::Rechecker => ApiFlags::RECHECKER,
            _ => ApiFlags::REGAMEDLL,
        }
    }

    fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }
}

/// Stable numeric identifier of a hook point
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionId(pub u32);

impl FunctionId {
    pub const fn new(group: HookGroup, index: u32) -> Self {
        Self(group as u32 * REGION_RANGE + index)
    }

    /// Group this id belongs to, `None` for ids outside every group
    pub fn group(self) -> Option<HookGroup> {
        HookGroup::from_index(self.0 / REGION_RANGE)
    }

    /// Index inside the group
    pub fn index(self) -> u32 {
        self.0 % REGION_RANGE
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.group() {
            Some(group) => write!(f, "{:?}#{}", group, self.index()),
            None => write!(f, "function#{}", self.0),
        }
    }
}

/// Argument and return types of a hook point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookSignature {
    pub args: Vec<ArgSpec>,
    /// `None` for void hook points
    pub ret: Option<ArgSpec>,
}

impl HookSignature {
    /// Signature of a value-returning hook point
    pub fn of<A: HookArgs, R: WireValue>() -> Self {
        Self {
            args: A::SIGNATURE.to_vec(),
            ret: Some(ArgSpec::of::<R>()),
        }
    }

    /// Signature of a void hook point
    pub fn void<A: HookArgs>() -> Self {
        Self {
            args: A::SIGNATURE.to_vec(),
            ret: None,
        }
    }

    /// Check the signature can be marshaled through one call context
    pub fn validate(&self, function: &str) -> Result<(), HookChainError> {
        if self.args.len() > MAX_HOOKCHAIN_ARGS {
            return Err(HookChainError::TooManyArguments {
                function: function.to_string(),
                count: self.args.len(),
                max: MAX_HOOKCHAIN_ARGS,
            });
        }

        if let Some((index, arg)) = self.args.iter().enumerate().find(|(_, a)| !a.fits_word()) {
            return Err(HookChainError::ArgumentTooWide {
                function: function.to_string(),
                index,
                ty: arg.ty,
                width: arg.width,
            });
        }

        match self.ret {
            Some(ret) if !ret.fits_word() => Err(HookChainError::ReturnTooWide {
                function: function.to_string(),
                ty: ret.ty,
                width: ret.width,
            }),
            // Override strings live in the temp arena, which is only tracked
            // for calls carrying a string argument
            Some(ret) if ret.ty == WireType::String && !self.args.iter().any(|a| a.ty == WireType::String) => {
                Err(HookChainError::StringReturnWithoutStringArgs {
                    function: function.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Parameter types handed to the script VM
    pub fn params(&self) -> Vec<WireType> {
        self.args.iter().map(|a| a.ty).collect()
    }

    /// Whether a call site's native types match this signature
    pub fn matches(&self, args: &[ArgSpec], ret: Option<ArgSpec>) -> bool {
        self.args == args && self.ret == ret
    }
}

/// One hook point: its signature and ordered callback lists
#[derive(Debug, Clone)]
pub struct HookPoint {
    pub function: FunctionId,
    pub name: String,
    pub signature: HookSignature,
    pub pre: Vec<Arc<HookRecord>>,
    pub post: Vec<Arc<HookRecord>>,
}

impl HookPoint {
    fn new(function: FunctionId, name: &str, signature: HookSignature) -> Self {
        Self {
            function,
            name: name.to_string(),
            signature,
            pre: Vec::new(),
            post: Vec::new(),
        }
    }

    /// Whether no callback is registered
    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty()
    }
}

/// In-memory registry of hook points
///
/// Points are stored behind `Arc` so a dispatch can walk a snapshot while
/// callbacks register or remove hooks; changes apply from the next call.
pub struct HookRegistry {
    points: HashMap<FunctionId, Arc<HookPoint>>,
    hooks: SlotMap<HookKey, Arc<HookRecord>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            points: HashMap::new(),
            hooks: SlotMap::with_key(),
        }
    }

    /// Declare a hook point with an empty callback list
    pub fn declare(&mut self, function: FunctionId, name: &str, signature: HookSignature) -> Result<(), HookChainError> {
        signature.validate(name)?;

        if self.points.contains_key(&function) {
            return Err(HookChainError::AlreadyDeclared(function));
        }

        self.points.insert(function, Arc::new(HookPoint::new(function, name, signature)));
        tracing::debug!("Declared hook point {} ({})", name, function);
        Ok(())
    }

    /// Append an enabled record to the hook point's pre or post list
    pub fn register(
        &mut self,
        function: FunctionId,
        owner: ScriptId,
        callback: &str,
        forward: ForwardRef,
        post: bool,
    ) -> Result<(HookKey, Arc<HookRecord>), HookChainError> {
        let point = self
            .points
            .get_mut(&function)
            .ok_or(HookChainError::UnknownFunction(function))?;
        let point = Arc::make_mut(point);
        let list = if post { &mut point.post } else { &mut point.pre };

        let mut record = HookRecord::new(owner, callback, forward, function, &point.name, post);
        record.wire(list.len());
        let record = Arc::new(record);
        list.push(Arc::clone(&record));

        let key = self.hooks.insert(Arc::clone(&record));
        tracing::debug!(
            "Registered {}hook {} for {} from {}",
            if post { "post " } else { "" },
            record.callback_name(),
            point.name,
            owner
        );
        Ok((key, record))
    }

    /// Record behind a key
    pub fn hook(&self, key: HookKey) -> Option<&Arc<HookRecord>> {
        self.hooks.get(key)
    }

    /// Remove every record owned by `script` and return them stopped
    pub fn remove_script(&mut self, script: ScriptId) -> Vec<Arc<HookRecord>> {
        let keys: Vec<HookKey> = self
            .hooks
            .iter()
            .filter(|(_, rec)| rec.owner() == script)
            .map(|(key, _)| key)
            .collect();
        if keys.is_empty() {
            return Vec::new();
        }

        let removed: Vec<Arc<HookRecord>> = keys.into_iter().filter_map(|key| self.hooks.remove(key)).collect();
        for record in &removed {
            record.stop();
        }

        for point in self.points.values_mut() {
            let owned = |rec: &Arc<HookRecord>| rec.owner() == script;
            if point.pre.iter().any(owned) || point.post.iter().any(owned) {
                let point = Arc::make_mut(point);
                point.pre.retain(|rec| rec.owner() != script);
                point.post.retain(|rec| rec.owner() != script);
            }
        }

        tracing::debug!("Removed {} hooks owned by {}", removed.len(), script);
        removed
    }

    /// Records owned by `script`
    pub fn script_hooks(&self, script: ScriptId) -> impl Iterator<Item = &Arc<HookRecord>> {
        self.hooks.values().filter(move |rec| rec.owner() == script)
    }

    /// Snapshot of a hook point
    pub fn resolve(&self, function: FunctionId) -> Option<Arc<HookPoint>> {
        self.points.get(&function).cloned()
    }

    pub fn points(&self) -> impl Iterator<Item = &Arc<HookPoint>> {
        self.points.values()
    }

    /// Number of registered hooks
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hookchain::record::ForwardState;
    use crate::hookchain::wire::{EntityPtr, NativeStr};

    const SPAWN: FunctionId = FunctionId::new(HookGroup::Player, 0);

    fn registry() -> HookRegistry {
        let mut reg = HookRegistry::new();
        reg.declare(SPAWN, "CBasePlayer_Spawn", HookSignature::void::<(EntityPtr,)>())
            .unwrap();
        reg
    }

    #[test]
    fn test_function_id_layout() {
        let id = FunctionId::new(HookGroup::Player, 5);
        assert_eq!(id.0, 3 * REGION_RANGE + 5);
        assert_eq!(id.group(), Some(HookGroup::Player));
        assert_eq!(id.index(), 5);
        assert_eq!(id.to_string(), "Player#5");
        assert_eq!(FunctionId(50 * REGION_RANGE).group(), None);
    }

    #[test]
    fn test_group_requirements() {
        assert_eq!(HookGroup::Engine.required_api(), ApiFlags::REHLDS);
        assert_eq!(HookGroup::Rechecker.required_api(), ApiFlags::RECHECKER);
        assert_eq!(HookGroup::Weapon.required_api(), ApiFlags::REGAMEDLL);
    }

    #[test]
    fn test_declare_rejects_wide_values() {
        let mut reg = HookRegistry::new();

        let err = reg
            .declare(FunctionId(1), "Wide", HookSignature::void::<(i32, i64)>())
            .unwrap_err();
        assert!(matches!(err, HookChainError::ArgumentTooWide { index: 1, .. }));
        assert!(err.is_constraint_violation());

        let err = reg
            .declare(FunctionId(2), "WideRet", HookSignature::of::<(), f64>())
            .unwrap_err();
        assert!(matches!(err, HookChainError::ReturnTooWide { ty: WireType::Float, width: 8, .. }));

        assert!(reg.resolve(FunctionId(1)).is_none());
    }

    #[test]
    fn test_string_return_requires_string_argument() {
        let mut reg = HookRegistry::new();

        let err = reg
            .declare(FunctionId(3), "GetName", HookSignature::of::<(EntityPtr,), NativeStr>())
            .unwrap_err();
        assert!(matches!(err, HookChainError::StringReturnWithoutStringArgs { .. }));
        assert!(err.is_constraint_violation());

        reg.declare(FunctionId(4), "Translate", HookSignature::of::<(NativeStr,), NativeStr>())
            .unwrap();
        assert!(reg.resolve(FunctionId(4)).is_some());
    }

    #[test]
    fn test_declare_rejects_too_many_arguments() {
        let mut reg = HookRegistry::new();
        let signature = HookSignature {
            args: vec![ArgSpec::of::<i32>(); MAX_HOOKCHAIN_ARGS + 1],
            ret: None,
        };

        let err = reg.declare(FunctionId(3), "TooMany", signature).unwrap_err();
        assert_eq!(
            err,
            HookChainError::TooManyArguments {
                function: "TooMany".to_string(),
                count: 13,
                max: 12,
            }
        );
    }

    #[test]
    fn test_declare_twice() {
        let mut reg = registry();
        let err = reg
            .declare(SPAWN, "CBasePlayer_Spawn", HookSignature::void::<(EntityPtr,)>())
            .unwrap_err();
        assert_eq!(err, HookChainError::AlreadyDeclared(SPAWN));
    }

    #[test]
    fn test_register_keeps_order() {
        let mut reg = registry();
        let (_, a) = reg.register(SPAWN, ScriptId(1), "a", ForwardRef(1), false).unwrap();
        let (_, b) = reg.register(SPAWN, ScriptId(2), "b", ForwardRef(2), false).unwrap();
        let (_, c) = reg.register(SPAWN, ScriptId(1), "c", ForwardRef(3), true).unwrap();

        assert_eq!(a.slot_index(), 0);
        assert_eq!(b.slot_index(), 1);
        assert_eq!(c.slot_index(), 0);
        assert_eq!(c.state(), ForwardState::Enabled);

        let point = reg.resolve(SPAWN).unwrap();
        let names: Vec<_> = point.pre.iter().map(|r| r.callback_name()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(point.post.len(), 1);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_register_unknown_function() {
        let mut reg = HookRegistry::new();
        let err = reg
            .register(SPAWN, ScriptId(1), "a", ForwardRef(1), false)
            .unwrap_err();
        assert_eq!(err, HookChainError::UnknownFunction(SPAWN));
    }

    #[test]
    fn test_snapshot_unaffected_by_registration() {
        let mut reg = registry();
        reg.register(SPAWN, ScriptId(1), "a", ForwardRef(1), false).unwrap();

        let snapshot = reg.resolve(SPAWN).unwrap();
        reg.register(SPAWN, ScriptId(1), "b", ForwardRef(2), false).unwrap();

        assert_eq!(snapshot.pre.len(), 1);
        assert_eq!(reg.resolve(SPAWN).unwrap().pre.len(), 2);
    }

    #[test]
    fn test_remove_script() {
        let mut reg = registry();
        let (key_a, _) = reg.register(SPAWN, ScriptId(1), "a", ForwardRef(1), false).unwrap();
        let (key_b, _) = reg.register(SPAWN, ScriptId(2), "b", ForwardRef(2), true).unwrap();

        let removed = reg.remove_script(ScriptId(1));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].state(), ForwardState::Stopped);
        assert!(reg.hook(key_a).is_none());
        assert!(reg.hook(key_b).is_some());

        let point = reg.resolve(SPAWN).unwrap();
        assert!(point.pre.is_empty());
        assert_eq!(point.post.len(), 1);

        assert!(reg.remove_script(ScriptId(9)).is_empty());
    }

    #[test]
    fn test_signature_matching() {
        let sig = HookSignature::of::<(NativeStr, i32), bool>();
        assert_eq!(sig.params(), [WireType::String, WireType::Integer]);
        assert!(sig.matches(<(NativeStr, i32)>::SIGNATURE, Some(ArgSpec::of::<bool>())));
        assert!(!sig.matches(<(NativeStr, f32)>::SIGNATURE, Some(ArgSpec::of::<bool>())));
        assert!(!sig.matches(<(NativeStr, i32)>::SIGNATURE, None));
    }
}
