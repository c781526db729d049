//! The demangled parse tree.
//!
//! A mangled name decodes into a tree of [`Node`]s. Every node has a
//! [`Kind`] naming its syntactic category and either a payload (an integer
//! or a piece of text) or an ordered list of children, never both. Nodes are
//! owned by a [`NodeArena`](crate::NodeArena) and referenced by
//! [`NodeId`](crate::NodeId); a subtree reached through a back-reference is
//! shared, not copied, so two positions in the tree may name the same node.

use std::borrow::Cow;
use std::fmt;

use bitflags::bitflags;

use crate::arena::{NodeArena, NodeId};

/// Syntactic category of a demangled node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Global,
    Identifier,
    Index,
    Module,
    LocalDeclName,
    PrivateDeclName,
    InfixOperator,
    PrefixOperator,
    PostfixOperator,

    Type,
    TypeMangling,
    Class,
    Structure,
    Enum,
    Protocol,
    TypeAlias,
    Extension,
    BoundGenericClass,
    BoundGenericStructure,
    BoundGenericEnum,
    TypeList,
    EmptyList,
    FirstElementMarker,
    VariadicMarker,
    Tuple,
    TupleElement,
    TupleElementName,

    FunctionType,
    ThinFunctionType,
    AutoClosureType,
    UncurriedFunctionType,
    ObjCBlock,
    CFunctionPointer,
    ArgumentTuple,
    ReturnType,
    ThrowsAnnotation,
    ProtocolList,

    Function,
    Allocator,
    Constructor,
    Destructor,
    Deallocator,
    Initializer,
    IVarInitializer,
    IVarDestroyer,
    Variable,
    Subscript,
    Static,
    Getter,
    GlobalGetter,
    Setter,
    MaterializeForSet,
    WillSet,
    DidSet,
    MutableAddressor,
    OwningAddressor,
    ExplicitClosure,
    ImplicitClosure,
    DefaultArgumentInitializer,
    GenericTypeParamDecl,

    DependentGenericSignature,
    DependentPseudogenericSignature,
    DependentGenericParamCount,
    DependentGenericParamType,
    DependentGenericType,
    DependentMemberType,
    DependentAssociatedTypeRef,
    DependentGenericConformanceRequirement,
    DependentGenericSameTypeRequirement,
    DependentGenericLayoutRequirement,

    Metatype,
    ExistentialMetatype,
    MetatypeRepresentation,
    InOut,
    Weak,
    Unowned,
    Unmanaged,
    DynamicSelf,
    SILBoxType,
    BuiltinTypeName,

    TypeMetadata,
    TypeMetadataAccessFunction,
    TypeMetadataLazyCache,
    FullTypeMetadata,
    Metaclass,
    NominalTypeDescriptor,
    ProtocolDescriptor,
    GenericTypeMetadataPattern,

    CurryThunk,
    ObjCAttribute,
    NonObjCAttribute,
    DynamicAttribute,
    DirectMethodReferenceAttribute,
    PartialApplyForwarder,
    PartialApplyObjCForwarder,
    ReabstractionThunk,
    ReabstractionThunkHelper,
    GenericSpecialization,
    GenericSpecializationNotReAbstracted,
    GenericSpecializationParam,
    SpecializationPassID,
    SpecializationIsFragile,
    FunctionSignatureSpecialization,
    FunctionSignatureSpecializationParam,
    FunctionSignatureSpecializationParamKind,
    FunctionSignatureSpecializationParamPayload,

    ProtocolConformance,
    ProtocolWitness,
    ProtocolWitnessTable,
    ProtocolWitnessTableAccessor,
    GenericProtocolWitnessTable,
    GenericProtocolWitnessTableInstantiationFunction,
    LazyProtocolWitnessTableAccessor,
    LazyProtocolWitnessTableCacheVariable,
    AssociatedTypeMetadataAccessor,
    AssociatedTypeWitnessTableAccessor,
    ValueWitness,
    ValueWitnessTable,
    FieldOffset,
    Directness,

    ImplFunctionType,
    ImplConvention,
    ImplFunctionAttribute,
    ImplParameter,
    ImplResult,
    ImplErrorResult,
}

/// Scalar or text carried by a node. Exclusive with having children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload<'a> {
    None,
    Index(u64),
    Text(Cow<'a, str>),
}

/// One node of the demangled tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<'a> {
    kind: Kind,
    payload: Payload<'a>,
    children: Vec<NodeId>,
}

impl<'a> Node<'a> {
    pub(crate) fn new(kind: Kind, payload: Payload<'a>) -> Self {
        Node {
            kind,
            payload,
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn payload(&self) -> &Payload<'a> {
        &self.payload
    }

    /// The integer payload, if this node carries one.
    pub fn index(&self) -> Option<u64> {
        match self.payload {
            Payload::Index(idx) => Some(idx),
            _ => None,
        }
    }

    /// The text payload, if this node carries one.
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    pub(crate) fn text_cow(&self) -> Option<&Cow<'a, str>> {
        match &self.payload {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<NodeId> {
        &mut self.children
    }

    pub(crate) fn push_child(&mut self, child: NodeId) {
        // A node carries a payload or children, never both.
        debug_assert!(matches!(self.payload, Payload::None));
        self.children.push(child);
    }
}

/// A node together with the arena that owns it.
///
/// Implements structural equality and an indented tree dump, which is what
/// tests and downstream printers traverse.
#[derive(Clone, Copy)]
pub struct NodeRef<'n, 'a> {
    pub(crate) arena: &'n NodeArena<'a>,
    pub(crate) id: NodeId,
}

impl<'n, 'a> NodeRef<'n, 'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node(&self) -> &'n Node<'a> {
        self.arena.get(self.id)
    }

    pub fn kind(&self) -> Kind {
        self.node().kind()
    }

    pub fn index(&self) -> Option<u64> {
        self.node().index()
    }

    pub fn text(&self) -> Option<&'n str> {
        self.node().text()
    }

    pub fn num_children(&self) -> usize {
        self.node().children().len()
    }

    pub fn child(&self, idx: usize) -> Option<NodeRef<'n, 'a>> {
        let id = *self.node().children().get(idx)?;
        Some(NodeRef {
            arena: self.arena,
            id,
        })
    }

    pub fn children(self) -> impl Iterator<Item = NodeRef<'n, 'a>> {
        self.node().children().iter().map(move |&id| NodeRef {
            arena: self.arena,
            id,
        })
    }

    fn dump(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        for _ in 0..depth {
            f.write_str("  ")?;
        }
        match self.node().payload() {
            Payload::None => writeln!(f, "{:?}", self.kind())?,
            Payload::Index(idx) => writeln!(f, "{:?}({idx})", self.kind())?,
            Payload::Text(text) => writeln!(f, "{:?}({text:?})", self.kind())?,
        }
        for child in self.children() {
            child.dump(f, depth + 1)?;
        }
        Ok(())
    }
}

impl PartialEq for NodeRef<'_, '_> {
    /// Structural comparison: kind, payload and children, recursively.
    /// Compare [`NodeRef::id`] for identity instead.
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.node(), other.node());
        a.kind() == b.kind()
            && a.payload() == b.payload()
            && a.children().len() == b.children().len()
            && self.children().zip(other.children()).all(|(x, y)| x == y)
    }
}

impl fmt::Debug for NodeRef<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.dump(f, 0)
    }
}

/// How function signature specialization rewrote a single parameter.
///
/// Stored in the payload of a `FunctionSignatureSpecializationParamKind`
/// node, OR'd with any applicable [`SpecializationParamFlags`] bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum SpecializationParamKind {
    ConstantPropFunction = 0,
    ConstantPropGlobal = 1,
    ConstantPropInteger = 2,
    ConstantPropFloat = 3,
    ConstantPropString = 4,
    ClosureProp = 5,
    BoxToValue = 6,
    BoxToStack = 7,
}

bitflags! {
    /// Attribute bits OR'd into a specialized parameter's kind payload.
    /// Unlike [`SpecializationParamKind`] values these can be combined:
    /// a parameter can be dead, have its ownership relaxed and be SROA'd
    /// all at once.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpecializationParamFlags: u64 {
        const DEAD = 1 << 6;
        const OWNED_TO_GUARANTEED = 1 << 7;
        const SROA = 1 << 8;
    }
}

/// The entry points of a type's value witness table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum ValueWitnessKind {
    AllocateBuffer = 0,
    AssignWithCopy,
    AssignWithTake,
    DeallocateBuffer,
    Destroy,
    DestroyBuffer,
    DestroyArray,
    InitializeBufferWithCopyOfBuffer,
    InitializeBufferWithCopy,
    InitializeWithCopy,
    InitializeBufferWithTake,
    InitializeWithTake,
    ProjectBuffer,
    InitializeBufferWithTakeOfBuffer,
    InitializeArrayWithCopy,
    InitializeArrayWithTakeFrontToBack,
    InitializeArrayWithTakeBackToFront,
    StoreExtraInhabitant,
    GetExtraInhabitantIndex,
    GetEnumTag,
    DestructiveProjectEnumData,
    DestructiveInjectEnumTag,
}

impl ValueWitnessKind {
    /// Decodes the two-letter value witness code.
    pub fn from_code(code: &[u8]) -> Option<ValueWitnessKind> {
        use ValueWitnessKind::*;
        Some(match code {
            b"al" => AllocateBuffer,
            b"ca" => AssignWithCopy,
            b"ta" => AssignWithTake,
            b"de" => DeallocateBuffer,
            b"xx" => Destroy,
            b"XX" => DestroyBuffer,
            b"Xx" => DestroyArray,
            b"CP" => InitializeBufferWithCopyOfBuffer,
            b"Cp" => InitializeBufferWithCopy,
            b"cp" => InitializeWithCopy,
            b"Tk" => InitializeBufferWithTake,
            b"tk" => InitializeWithTake,
            b"pr" => ProjectBuffer,
            b"TK" => InitializeBufferWithTakeOfBuffer,
            b"Cc" => InitializeArrayWithCopy,
            b"Tt" => InitializeArrayWithTakeFrontToBack,
            b"tT" => InitializeArrayWithTakeBackToFront,
            b"xs" => StoreExtraInhabitant,
            b"xg" => GetExtraInhabitantIndex,
            b"ug" => GetEnumTag,
            b"up" => DestructiveProjectEnumData,
            b"ui" => DestructiveInjectEnumTag,
            _ => return None,
        })
    }
}
