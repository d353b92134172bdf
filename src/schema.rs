//! Attribute schemas for the provider configuration, resources and data sources.
//!
//! Every resource attribute transcribes one field of a Graph object. Besides
//! type and flags it may carry a closed set of accepted values and the plan
//! modifiers the planner applies before diffing. Schemas are JSON-encoded on
//! the wire, so empty extras are left out of the encoding.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Int64,
    Float64,
    Bool,
    /// Ordered collection.
    List(Box<AttributeType>),
    /// Unordered collection; element order never produces a diff.
    Set(Box<AttributeType>),
    Map(Box<AttributeType>),
    /// Fixed member names, e.g. the Teams settings objects.
    Object(HashMap<String, AttributeType>),
    /// Any JSON value.
    Dynamic,
}

impl AttributeType {
    pub fn list(element: AttributeType) -> Self {
        Self::List(Box::new(element))
    }

    pub fn set(element: AttributeType) -> Self {
        Self::Set(Box::new(element))
    }

    pub fn map(element: AttributeType) -> Self {
        Self::Map(Box::new(element))
    }
}

/// Where an attribute's value comes from.
///
/// `optional` together with `computed` means Graph fills the value in when the
/// configuration leaves it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    /// Redacted by the host in plan output.
    pub sensitive: bool,
}

impl AttributeFlags {
    const fn with(required: bool, optional: bool, computed: bool) -> Self {
        Self {
            required,
            optional,
            computed,
            sensitive: false,
        }
    }

    pub const fn required() -> Self {
        Self::with(true, false, false)
    }

    pub const fn optional() -> Self {
        Self::with(false, true, false)
    }

    /// Set by the provider only.
    pub const fn computed() -> Self {
        Self::with(false, false, true)
    }

    pub const fn optional_computed() -> Self {
        Self::with(false, true, true)
    }

    pub fn sensitive(self) -> Self {
        Self {
            sensitive: true,
            ..self
        }
    }
}

/// Rule the planner applies to an attribute's proposed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanModifier {
    /// Plan the prior state value when the configuration leaves the attribute unset.
    UseStateForUnconfigured,
    /// A planned change replaces the resource instead of updating it.
    RequiresReplace,
}

impl PlanModifier {
    /// Name used in the JSON schema encoding and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UseStateForUnconfigured => "use_state_for_unconfigured",
            Self::RequiresReplace => "requires_replace",
        }
    }
}

/// One attribute of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    #[serde(flatten)]
    pub flags: AttributeFlags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Mirrors [`PlanModifier::RequiresReplace`] for hosts reading the flag.
    #[serde(default)]
    pub force_new: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Closed set for a string, or for every element of a string collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
    /// Applied in order; never contains duplicates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plan_modifiers: Vec<PlanModifier>,
}

macro_rules! scalar_builders {
    ($($name:ident => $ty:ident, $flags:ident;)*) => {
        $(
            #[doc = concat!("`", stringify!($name), "` attribute.")]
            pub fn $name() -> Self {
                Self::new(AttributeType::$ty, AttributeFlags::$flags())
            }
        )*
    };
}

impl Attribute {
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            default: None,
            allowed_values: None,
            plan_modifiers: Vec::new(),
        }
    }

    scalar_builders! {
        required_string => String, required;
        optional_string => String, optional;
        computed_string => String, computed;
        optional_computed_string => String, optional_computed;
        required_bool => Bool, required;
        optional_bool => Bool, optional;
        computed_bool => Bool, computed;
        optional_computed_bool => Bool, optional_computed;
        required_int64 => Int64, required;
        optional_int64 => Int64, optional;
        computed_int64 => Int64, computed;
        optional_computed_int64 => Int64, optional_computed;
    }

    /// Set of strings, the shape of Graph id and label collections.
    pub fn string_set(flags: AttributeFlags) -> Self {
        Self::new(AttributeType::set(AttributeType::String), flags)
    }

    pub fn is_computed_only(&self) -> bool {
        let AttributeFlags {
            required,
            optional,
            computed,
            ..
        } = self.flags;
        computed && !optional && !required
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..self
        }
    }

    /// Changing the attribute replaces the resource.
    pub fn with_force_new(self) -> Self {
        Self {
            force_new: true,
            ..self
        }
        .with_plan_modifier(PlanModifier::RequiresReplace)
    }

    pub fn with_allowed_values<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_values: Some(values.into_iter().map(Into::into).collect()),
            ..self
        }
    }

    pub fn with_plan_modifier(mut self, modifier: PlanModifier) -> Self {
        if !self.has_plan_modifier(modifier) {
            self.plan_modifiers.push(modifier);
        }
        self
    }

    pub fn use_state_for_unconfigured(self) -> Self {
        self.with_plan_modifier(PlanModifier::UseStateForUnconfigured)
    }

    pub fn has_plan_modifier(&self, modifier: PlanModifier) -> bool {
        self.plan_modifiers.contains(&modifier)
    }

    pub fn with_default(self, default: Value) -> Self {
        Self {
            default: Some(default),
            ..self
        }
    }

    pub fn sensitive(self) -> Self {
        Self {
            flags: self.flags.sensitive(),
            ..self
        }
    }
}

/// How many instances of a nested block a configuration holds, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    #[default]
    Single,
    List,
    Set,
    /// Keyed by string.
    Map,
}

/// A group of attributes and nested blocks.
///
/// The Graph resources model their settings as object attributes rather than
/// nested blocks, so that plan modifiers cover a settings object as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, Attribute>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub blocks: HashMap<String, NestedBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    pub fn with_description(self, description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..self
        }
    }
}

/// A block nested under an attribute name, with item count limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    #[serde(flatten)]
    pub block: Block,
    #[serde(default)]
    pub nesting_mode: BlockNestingMode,
    #[serde(default)]
    pub min_items: u32,
    /// Zero means unbounded.
    #[serde(default)]
    pub max_items: u32,
}

impl NestedBlock {
    fn nested(block: Block, nesting_mode: BlockNestingMode, max_items: u32) -> Self {
        Self {
            block,
            nesting_mode,
            min_items: 0,
            max_items,
        }
    }

    /// At most one instance.
    pub fn single(block: Block) -> Self {
        Self::nested(block, BlockNestingMode::Single, 1)
    }

    pub fn list(block: Block) -> Self {
        Self::nested(block, BlockNestingMode::List, 0)
    }

    pub fn set(block: Block) -> Self {
        Self::nested(block, BlockNestingMode::Set, 0)
    }

    pub fn map(block: Block) -> Self {
        Self::nested(block, BlockNestingMode::Map, 0)
    }

    pub fn with_min_items(self, min_items: u32) -> Self {
        Self { min_items, ..self }
    }

    pub fn with_max_items(self, max_items: u32) -> Self {
        Self { max_items, ..self }
    }
}

/// Versioned root block of a resource, data source or the provider itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Schema {
    /// Bumped when the stored state shape changes.
    #[serde(default)]
    pub version: u64,
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    pub fn new(version: u64) -> Self {
        Self {
            version,
            block: Block::new(),
        }
    }

    pub fn v0() -> Self {
        Self::new(0)
    }

    pub fn with_attribute(self, name: impl Into<String>, attr: Attribute) -> Self {
        Self {
            block: self.block.with_attribute(name, attr),
            ..self
        }
    }

    pub fn with_block(self, name: impl Into<String>, block: NestedBlock) -> Self {
        Self {
            block: self.block.with_block(name, block),
            ..self
        }
    }
}

/// Everything the provider declares: its own configuration plus each
/// resource and data source type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    #[serde(default)]
    pub provider: Schema,
    #[serde(default)]
    pub resources: HashMap<String, Schema>,
    #[serde(default)]
    pub data_sources: HashMap<String, Schema>,
}

impl ProviderSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider_config(self, provider: Schema) -> Self {
        Self { provider, ..self }
    }

    pub fn with_resource(mut self, type_name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(type_name.into(), schema);
        self
    }

    pub fn with_data_source(mut self, type_name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(type_name.into(), schema);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// The operation fails.
    Error,
    Warning,
}

/// A message reported back to the host, optionally pinned to an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Dotted path, e.g. `fun_settings.giphy_content_rating`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    fn with_severity(severity: DiagnosticSeverity, summary: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    pub fn error(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Error, summary)
    }

    pub fn warning(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Warning, summary)
    }

    pub fn with_detail(self, detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..self
        }
    }

    pub fn with_attribute(self, attribute: impl Into<String>) -> Self {
        Self {
            attribute: Some(attribute.into()),
            ..self
        }
    }
}
