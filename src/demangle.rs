//! Grammar productions for the Swift new mangling.
//!
//! ```text
//! <symbol> = '_T0' <node>+            // also accepted: '$s', '$S'
//!          | '_Tt' <objc-type-name>
//!
//! <node> = <identifier>               // leading digit; '0' marks word
//!                                     // substitutions, '00' punycode
//!        | 'A' <substitution>+        // back-references into earlier nodes
//!        | 'S' <known-type-or-module>
//!        | 'C' | 'V' | 'O' | 'P' | 'a'   // nominal types & aliases
//!        | 'G' <bound-generic>
//!        | 'F' | 'c' | 'X?' | 'I'     // function types
//!        | 't' | 'y' | '_' | 'd'      // tuples & list markers
//!        | 'r' | 'l' | 'R' | 'u'      // generic signatures
//!        | 'x' | 'q' | 'Q'            // generic parameter references
//!        | 'm' | 'M' | 'X?'           // metatypes & metadata
//!        | 'f' | 'v' | 'i' | 'Z'      // entities
//!        | 'T' <thunk-or-specialization>
//!        | 'W' <witness> | 'w' <value-witness>
//!        | 'B' <builtin>
//! ```
//!
//! Every production consumes exactly the characters belonging to it, pops
//! the children it needs off the node stack and produces exactly one node.
//! On failure it reports `None`; the cursor only ever advances past literals
//! an inner production successfully matched.

use crate::arena::NodeId;
use crate::context::Demangler;
use crate::node::{Kind, SpecializationParamKind, ValueWitnessKind};
use crate::punycode;

/// Ceiling for the one genuinely recursive production (bound generic
/// nesting). Crafted inputs can nest far deeper than any real symbol.
const MAX_DEPTH: usize = 256;

/// A substitution repeat count past this is a malformed input, not a
/// compression win.
const MAX_REPEAT_COUNT: u64 = 2048;

fn is_decl_name(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::Identifier
            | Kind::LocalDeclName
            | Kind::PrivateDeclName
            | Kind::InfixOperator
            | Kind::PrefixOperator
            | Kind::PostfixOperator
    )
}

fn is_any_generic(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::Class | Kind::Structure | Kind::Enum | Kind::Protocol | Kind::TypeAlias
    )
}

fn is_context(kind: Kind) -> bool {
    is_any_generic(kind)
        || matches!(
            kind,
            Kind::Module
                | Kind::Extension
                | Kind::BoundGenericClass
                | Kind::BoundGenericStructure
                | Kind::BoundGenericEnum
                | Kind::Function
                | Kind::Variable
                | Kind::Subscript
                | Kind::Static
                | Kind::Allocator
                | Kind::Constructor
                | Kind::Destructor
                | Kind::Deallocator
                | Kind::Initializer
                | Kind::IVarInitializer
                | Kind::IVarDestroyer
                | Kind::Getter
                | Kind::GlobalGetter
                | Kind::Setter
                | Kind::MaterializeForSet
                | Kind::WillSet
                | Kind::DidSet
                | Kind::MutableAddressor
                | Kind::OwningAddressor
                | Kind::ExplicitClosure
                | Kind::ImplicitClosure
                | Kind::DefaultArgumentInitializer
                | Kind::GenericTypeParamDecl
        )
}

fn is_function_attr(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::CurryThunk
            | Kind::ObjCAttribute
            | Kind::NonObjCAttribute
            | Kind::DynamicAttribute
            | Kind::DirectMethodReferenceAttribute
            | Kind::PartialApplyForwarder
            | Kind::PartialApplyObjCForwarder
            | Kind::ReabstractionThunk
            | Kind::ReabstractionThunkHelper
            | Kind::GenericSpecialization
            | Kind::GenericSpecializationNotReAbstracted
            | Kind::FunctionSignatureSpecialization
            | Kind::ProtocolWitness
    )
}

fn is_entity(kind: Kind) -> bool {
    kind == Kind::Type || is_context(kind) || is_function_attr(kind)
}

fn is_requirement(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::DependentGenericConformanceRequirement
            | Kind::DependentGenericSameTypeRequirement
            | Kind::DependentGenericLayoutRequirement
    )
}

impl<'a, 'n> Demangler<'a, 'n> {
    /// Decodes a full symbol, mangling prefix included. The result is a
    /// `Global` node wrapping the decoded entity.
    pub(crate) fn demangle_symbol(mut self) -> Option<NodeId> {
        // Objective-C runtime names use their own self-contained grammar.
        if self.next_if_str("_Tt") {
            return self.demangle_objc_type_name();
        }
        if !(self.next_if_str("_T0") || self.next_if_str("$s") || self.next_if_str("$S")) {
            return None;
        }

        self.parse_and_push_nodes()?;
        let root = self.pop_node()?;
        if self.stack_len() != 0 {
            return None;
        }

        let global = self.create(Kind::Global);
        // A bare type mangling contributes its type directly.
        let top = if self.arena[root].kind() == Kind::Type {
            *self.arena[root].children().first()?
        } else {
            root
        };
        self.arena.add_child(global, top);
        Some(global)
    }

    /// Decodes a mangled type fragment (no symbol prefix).
    pub(crate) fn demangle_type(mut self) -> Option<NodeId> {
        self.parse_and_push_nodes()?;
        let root = self.pop_node()?;
        if self.stack_len() != 0 {
            return None;
        }
        Some(root)
    }

    fn parse_and_push_nodes(&mut self) -> Option<()> {
        while !self.at_end() {
            let node = self.demangle_operator()?;
            self.push_node(node);
        }
        Some(())
    }

    fn demangle_operator(&mut self) -> Option<NodeId> {
        match self.next_char()? {
            b'A' => self.demangle_multi_substitutions(),
            b'B' => self.demangle_builtin_type(),
            b'C' => self.demangle_any_generic_type(Kind::Class),
            b'D' => self.create_with_popped_type(Kind::TypeMangling),
            b'E' => self.demangle_extension_context(),
            b'F' => self.demangle_plain_function(),
            b'G' => self.demangle_bound_generic_type(),
            b'I' => self.demangle_impl_function_type(),
            b'K' => Some(self.create(Kind::ThrowsAnnotation)),
            b'L' => self.demangle_local_identifier(),
            b'M' => self.demangle_metadata(),
            b'N' => self.create_with_popped_type(Kind::TypeMetadata),
            b'O' => self.demangle_any_generic_type(Kind::Enum),
            b'P' => self.demangle_any_generic_type(Kind::Protocol),
            b'Q' => self.demangle_archetype(),
            b'R' => self.demangle_generic_requirement(),
            b'S' => self.demangle_standard_substitution(),
            b'T' => self.demangle_thunk_or_specialization(),
            b'V' => self.demangle_any_generic_type(Kind::Structure),
            b'W' => self.demangle_witness(),
            b'X' => self.demangle_special_type(),
            b'Z' => {
                let entity = self.pop_if(is_entity);
                self.create_with_child(Kind::Static, entity)
            }
            b'a' => self.demangle_any_generic_type(Kind::TypeAlias),
            b'c' => self.pop_function_type(Kind::FunctionType),
            b'd' => Some(self.create(Kind::VariadicMarker)),
            b'f' => self.demangle_function_entity(),
            b'i' => self.demangle_entity(Kind::Subscript),
            b'l' => self.demangle_generic_signature(false),
            b'm' => {
                let ty = self.pop_kind(Kind::Type);
                let meta = self.create_with_child(Kind::Metatype, ty);
                self.create_type(meta)
            }
            b'o' => self.demangle_operator_identifier(),
            b'p' => self.demangle_protocol_list_type(),
            b'q' => {
                let param = self.demangle_generic_param_index();
                self.create_type(param)
            }
            b'r' => self.demangle_generic_signature(true),
            b's' => Some(self.arena.create_borrowed(Kind::Module, "Swift")),
            b't' => self.pop_tuple(),
            b'u' => self.demangle_generic_type(),
            b'v' => self.demangle_entity(Kind::Variable),
            b'w' => self.demangle_value_witness(),
            b'x' => {
                let param = self.dependent_generic_param(0, 0);
                self.create_type(Some(param))
            }
            b'y' => Some(self.create(Kind::EmptyList)),
            b'z' => {
                let child = self.pop_type_and_get_child();
                let inout = self.create_with_child(Kind::InOut, child);
                self.create_type(inout)
            }
            b'_' => Some(self.create(Kind::FirstElementMarker)),
            b'0'..=b'9' => {
                // length-prefixed identifier; hand the digit back
                self.push_back();
                self.demangle_identifier()
            }
            _ => None,
        }
    }

    // ---- numerals --------------------------------------------------------

    fn demangle_natural(&mut self) -> Option<u64> {
        self.peek_char().filter(u8::is_ascii_digit)?;
        let mut num: u64 = 0;
        while let Some(c @ b'0'..=b'9') = self.peek_char() {
            num = num.checked_mul(10)?.checked_add(u64::from(c - b'0'))?;
            self.next_char();
        }
        Some(num)
    }

    /// `_` encodes 0, `<n>_` encodes n+1.
    fn demangle_index(&mut self) -> Option<u64> {
        if self.next_if(b'_') {
            return Some(0);
        }
        let num = self.demangle_natural()?;
        if !self.next_if(b'_') {
            return None;
        }
        num.checked_add(1)
    }

    fn demangle_index_as_node(&mut self) -> Option<NodeId> {
        let idx = self.demangle_index()?;
        Some(self.arena.create_index(Kind::Index, idx))
    }

    // ---- identifiers -----------------------------------------------------

    /// ```text
    /// <identifier> = <natural> <chars>                 // plain
    ///              | '0' (<word-ref>* <natural> <chars>)* '0'?
    ///              | '00' <natural> '0'? <punycode-chars>
    ///
    /// <word-ref> = 'a'..'z'    // word, more substitutions follow
    ///            | 'A'..'Z'    // word, last substitution
    /// ```
    fn demangle_identifier(&mut self) -> Option<NodeId> {
        let mut has_word_substs = false;
        let mut is_punycoded = false;
        match self.peek_char()? {
            b'0' => {
                self.next_char();
                if self.peek_char() == Some(b'0') {
                    self.next_char();
                    is_punycoded = true;
                } else {
                    has_word_substs = true;
                }
            }
            b'1'..=b'9' => {}
            _ => return None,
        }

        // The common case is one plain slice of the input, which the node
        // borrows; anything assembled from words or punycode is copied.
        let mut ident = String::new();
        let mut plain_slice: Option<&'a str> = None;
        loop {
            while has_word_substs && self.peek_char().is_some_and(|c| c.is_ascii_alphabetic()) {
                let c = self.next_char()?;
                let word_idx = if c.is_ascii_lowercase() {
                    usize::from(c - b'a')
                } else {
                    has_word_substs = false;
                    usize::from(c - b'A')
                };
                let word = self.word(word_idx)?;
                if let Some(s) = plain_slice.take() {
                    ident.push_str(s);
                }
                ident.push_str(word);
            }
            if self.next_if(b'0') {
                break;
            }
            let num_chars = usize::try_from(self.demangle_natural()?).ok()?;
            if num_chars == 0 {
                return None;
            }
            if is_punycoded {
                self.next_if(b'0');
            }
            let slice = self.next_slice(num_chars)?;
            if is_punycoded {
                punycode::decode(slice, &mut ident)?;
            } else {
                self.record_words(slice);
                if ident.is_empty() && plain_slice.is_none() {
                    plain_slice = Some(slice);
                } else {
                    if let Some(s) = plain_slice.take() {
                        ident.push_str(s);
                    }
                    ident.push_str(slice);
                }
            }
            if !has_word_substs {
                break;
            }
        }

        let node = match plain_slice {
            Some(slice) => self.arena.create_borrowed(Kind::Identifier, slice),
            None if !ident.is_empty() => self.arena.create_text(Kind::Identifier, ident),
            None => return None,
        };
        self.add_substitution(node);
        Some(node)
    }

    /// `o` followed by the fixity char; the operator characters themselves
    /// were mangled through the reverse of the `&`→`a`, `@`→`c`, … table.
    fn demangle_operator_identifier(&mut self) -> Option<NodeId> {
        let ident = self.pop_kind(Kind::Identifier)?;
        let text = self.arena[ident].text_cow()?.clone();

        let mut op = String::with_capacity(text.len());
        for c in text.bytes() {
            if !c.is_ascii_lowercase() {
                op.push(c as char);
                continue;
            }
            op.push(match c {
                b'a' => '&',
                b'c' => '@',
                b'd' => '/',
                b'e' => '=',
                b'g' => '>',
                b'l' => '<',
                b'm' => '*',
                b'n' => '!',
                b'o' => '|',
                b'p' => '+',
                b'q' => '?',
                b'r' => '%',
                b's' => '-',
                b't' => '~',
                b'x' => '^',
                b'z' => '.',
                _ => return None,
            });
        }

        let kind = match self.next_char()? {
            b'i' => Kind::InfixOperator,
            b'p' => Kind::PrefixOperator,
            b'P' => Kind::PostfixOperator,
            _ => return None,
        };
        Some(self.arena.create_text(kind, op))
    }

    /// ```text
    /// <local-name> = <index> <decl-name> 'L'      // local decl #n
    ///              | <decl-name> <identifier> 'LL' // private, discriminated
    ///              | <identifier> 'Ll'             // discriminator only
    /// ```
    fn demangle_local_identifier(&mut self) -> Option<NodeId> {
        if self.next_if(b'L') {
            let discriminator = self.pop_kind(Kind::Identifier);
            let name = self.pop_if(is_decl_name);
            return self.create_with_children(Kind::PrivateDeclName, &[discriminator, name]);
        }
        if self.next_if(b'l') {
            let discriminator = self.pop_kind(Kind::Identifier);
            return self.create_with_child(Kind::PrivateDeclName, discriminator);
        }
        let discriminator = self.demangle_index_as_node()?;
        let name = self.pop_if(is_decl_name);
        self.create_with_children(Kind::LocalDeclName, &[Some(discriminator), name])
    }

    // ---- substitutions ---------------------------------------------------

    /// ```text
    /// <substitutions> = 'A' (<natural>? <subst>)* <natural>? <final-subst>
    ///
    /// <subst>       = 'a'..'z'        // push table entry, more follow
    /// <final-subst> = 'A'..'Z'        // table entry, result of the opcode
    ///               | '_'             // large index: natural + 27
    /// ```
    ///
    /// A natural before a letter is a repeat count: the same node (shared,
    /// not copied) lands on the stack that many times.
    fn demangle_multi_substitutions(&mut self) -> Option<NodeId> {
        let mut repeat: Option<u64> = None;
        loop {
            let c = self.next_char()?;
            if c.is_ascii_lowercase() {
                let node = self.push_multi_substitutions(repeat.take(), u64::from(c - b'a'))?;
                self.push_node(node);
            } else if c.is_ascii_uppercase() {
                return self.push_multi_substitutions(repeat.take(), u64::from(c - b'A'));
            } else if c == b'_' {
                let idx = match repeat.take() {
                    Some(n) => n.checked_add(27)?,
                    None => 26,
                };
                return self.substitution(idx as usize);
            } else {
                self.push_back();
                repeat = Some(self.demangle_natural()?);
            }
        }
    }

    fn push_multi_substitutions(&mut self, repeat: Option<u64>, idx: u64) -> Option<NodeId> {
        if repeat.is_some_and(|n| n > MAX_REPEAT_COUNT) {
            return None;
        }
        let node = self.substitution(idx as usize)?;
        let mut count = repeat.unwrap_or(1);
        while count > 1 {
            self.push_node(node);
            count -= 1;
        }
        Some(node)
    }

    /// `S` names the standard library's best-known types and modules; a
    /// natural in front is a repeat count, like for back-references.
    fn demangle_standard_substitution(&mut self) -> Option<NodeId> {
        match self.peek_char()? {
            b'o' => {
                self.next_char();
                Some(self.arena.create_borrowed(Kind::Module, "__ObjC"))
            }
            b'C' => {
                self.next_char();
                Some(self.arena.create_borrowed(Kind::Module, "__C"))
            }
            _ => {
                let repeat = self.demangle_natural().unwrap_or(0);
                if repeat > MAX_REPEAT_COUNT {
                    return None;
                }
                let c = self.next_char()?;
                let node = self.create_standard_substitution(c)?;
                let mut count = repeat;
                while count > 1 {
                    self.push_node(node);
                    count -= 1;
                }
                Some(node)
            }
        }
    }

    fn create_standard_substitution(&mut self, c: u8) -> Option<NodeId> {
        let (kind, name) = match c {
            b'a' => (Kind::Structure, "Array"),
            b'b' => (Kind::Structure, "Bool"),
            b'c' => (Kind::Structure, "UnicodeScalar"),
            b'D' => (Kind::Structure, "Dictionary"),
            b'd' => (Kind::Structure, "Double"),
            b'f' => (Kind::Structure, "Float"),
            b'h' => (Kind::Structure, "Set"),
            b'i' => (Kind::Structure, "Int"),
            b'N' => (Kind::Structure, "ClosedRange"),
            b'n' => (Kind::Structure, "Range"),
            b'O' => (Kind::Structure, "ObjectIdentifier"),
            b'P' => (Kind::Structure, "UnsafePointer"),
            b'p' => (Kind::Structure, "UnsafeMutablePointer"),
            b'R' => (Kind::Structure, "UnsafeBufferPointer"),
            b'r' => (Kind::Structure, "UnsafeMutableBufferPointer"),
            b'S' => (Kind::Structure, "String"),
            b's' => (Kind::Structure, "Substring"),
            b'u' => (Kind::Structure, "UInt"),
            b'V' => (Kind::Structure, "UnsafeRawPointer"),
            b'v' => (Kind::Structure, "UnsafeMutableRawPointer"),
            b'q' => (Kind::Enum, "Optional"),
            b'Q' => (Kind::Enum, "ImplicitlyUnwrappedOptional"),
            b'E' => (Kind::Protocol, "Encodable"),
            b'e' => (Kind::Protocol, "Decodable"),
            _ => return None,
        };
        let module = self.arena.create_borrowed(Kind::Module, "Swift");
        let ident = self.arena.create_borrowed(Kind::Identifier, name);
        let nominal = self.create_with_children(kind, &[Some(module), Some(ident)])?;
        self.create_type(Some(nominal))
    }

    // ---- modules & contexts ----------------------------------------------

    fn pop_module(&mut self) -> Option<NodeId> {
        if let Some(ident) = self.pop_kind(Kind::Identifier) {
            return Some(self.change_kind(ident, Kind::Module));
        }
        self.pop_kind(Kind::Module)
    }

    fn pop_context(&mut self) -> Option<NodeId> {
        if let Some(module) = self.pop_module() {
            return Some(module);
        }
        if let Some(ty) = self.pop_kind(Kind::Type) {
            let children = self.arena[ty].children();
            if children.len() != 1 {
                return None;
            }
            let child = children[0];
            if !is_context(self.arena[child].kind()) {
                return None;
            }
            return Some(child);
        }
        self.pop_if(is_context)
    }

    fn pop_type_and_get_child(&mut self) -> Option<NodeId> {
        let ty = self.pop_kind(Kind::Type)?;
        let children = self.arena[ty].children();
        if children.len() != 1 {
            return None;
        }
        Some(children[0])
    }

    fn pop_type_and_get_nominal(&mut self) -> Option<NodeId> {
        let child = self.pop_type_and_get_child()?;
        match self.arena[child].kind() {
            Kind::Class | Kind::Structure | Kind::Enum => Some(child),
            _ => None,
        }
    }

    // ---- nominal types ---------------------------------------------------

    fn demangle_any_generic_type(&mut self, kind: Kind) -> Option<NodeId> {
        let name = self.pop_if(is_decl_name);
        let ctx = self.pop_context();
        let nominal = self.create_with_children(kind, &[ctx, name])?;
        let ty = self.create_type(Some(nominal))?;
        self.add_substitution(ty);
        Some(ty)
    }

    fn demangle_extension_context(&mut self) -> Option<NodeId> {
        let gen_sig = self.pop_kind(Kind::DependentGenericSignature);
        let module = self.pop_module();
        let extended = self.pop_type_and_get_child();
        if !extended.is_some_and(|n| is_any_generic(self.arena[n].kind())) {
            return None;
        }
        let ext = self.create_with_children(Kind::Extension, &[module, extended])?;
        if let Some(sig) = gen_sig {
            self.arena.add_child(ext, sig);
        }
        Some(ext)
    }

    /// ```text
    /// <bound-generic> = <nominal-type> 'y' <level>* <type>* 'G'
    /// <level>         = <type>* '_'    // outermost arguments first
    /// ```
    ///
    /// Each level of a nested generic declaration gets its own argument
    /// list; the association with the right nesting level is recursive.
    fn demangle_bound_generic_type(&mut self) -> Option<NodeId> {
        let mut type_lists: Vec<NodeId> = Vec::new();
        loop {
            if type_lists.len() > MAX_DEPTH {
                return None;
            }
            let tlist = self.create(Kind::TypeList);
            type_lists.push(tlist);
            while let Some(ty) = self.pop_kind(Kind::Type) {
                self.arena.add_child(tlist, ty);
            }
            self.arena.reverse_children(tlist);
            if self.pop_kind(Kind::EmptyList).is_some() {
                break;
            }
            if self.pop_kind(Kind::FirstElementMarker).is_none() {
                return None;
            }
        }
        let nominal = self.pop_type_and_get_nominal()?;
        let bound = self.demangle_bound_generic_args(nominal, &type_lists, 0)?;
        let ty = self.create_type(Some(bound))?;
        self.add_substitution(ty);
        Some(ty)
    }

    fn demangle_bound_generic_args(
        &mut self,
        nominal: NodeId,
        type_lists: &[NodeId],
        idx: usize,
    ) -> Option<NodeId> {
        if self.arena[nominal].children().len() < 2 {
            return None;
        }
        let args = *type_lists.get(idx)?;

        let mut nominal = nominal;
        let context = self.arena[nominal].children()[0];
        if idx + 1 < type_lists.len() {
            // arguments remain for an outer nesting level
            let bound_parent = if self.arena[context].kind() == Kind::Extension {
                let ext_module = *self.arena[context].children().first()?;
                let ext_nominal = *self.arena[context].children().get(1)?;
                let parent = self.demangle_bound_generic_args(ext_nominal, type_lists, idx + 1)?;
                self.create_with_children(Kind::Extension, &[Some(ext_module), Some(parent)])?
            } else {
                self.demangle_bound_generic_args(context, type_lists, idx + 1)?
            };
            let name = self.arena[nominal].children()[1];
            let kind = self.arena[nominal].kind();
            nominal = self.create_with_children(kind, &[Some(bound_parent), Some(name)])?;
        }

        if self.arena[args].children().is_empty() {
            return Some(nominal);
        }
        let kind = match self.arena[nominal].kind() {
            Kind::Class => Kind::BoundGenericClass,
            Kind::Structure => Kind::BoundGenericStructure,
            Kind::Enum => Kind::BoundGenericEnum,
            _ => return None,
        };
        let ty = self.create_type(Some(nominal))?;
        self.create_with_children(kind, &[Some(ty), Some(args)])
    }

    // ---- function types --------------------------------------------------

    fn demangle_plain_function(&mut self) -> Option<NodeId> {
        let gen_sig = self.pop_kind(Kind::DependentGenericSignature);
        let mut ty = self.pop_function_type(Kind::FunctionType)?;
        if let Some(sig) = gen_sig {
            let dep = self.create_with_children(Kind::DependentGenericType, &[Some(sig), Some(ty)])?;
            ty = self.create_type(Some(dep))?;
        }
        let name = self.pop_if(is_decl_name)?;
        let ctx = self.pop_context()?;
        self.create_with_children(Kind::Function, &[Some(ctx), Some(name), Some(ty)])
    }

    fn pop_function_type(&mut self, kind: Kind) -> Option<NodeId> {
        let func = self.create(kind);
        if let Some(throws) = self.pop_kind(Kind::ThrowsAnnotation) {
            self.arena.add_child(func, throws);
        }
        let args = self.pop_function_params(Kind::ArgumentTuple)?;
        self.arena.add_child(func, args);
        let ret = self.pop_function_params(Kind::ReturnType)?;
        self.arena.add_child(func, ret);
        self.create_type(Some(func))
    }

    fn pop_function_params(&mut self, kind: Kind) -> Option<NodeId> {
        let params = if self.pop_kind(Kind::EmptyList).is_some() {
            let tuple = self.create(Kind::Tuple);
            self.create_type(Some(tuple))?
        } else {
            self.pop_kind(Kind::Type)?
        };
        self.create_with_child(kind, Some(params))
    }

    /// ```text
    /// <impl-function-type> = <type>* <gen-sig>? 'I' 'P'? <callee-convention>
    ///                        <function-attribute>? <parameter>* <result>*
    ///                        ('z' <error-result>)? '_'
    /// ```
    fn demangle_impl_function_type(&mut self) -> Option<NodeId> {
        let func = self.create(Kind::ImplFunctionType);

        let mut gen_sig = self.pop_kind(Kind::DependentGenericSignature);
        if let Some(sig) = gen_sig {
            if self.next_if(b'P') {
                gen_sig = Some(self.change_kind(sig, Kind::DependentPseudogenericSignature));
            }
        }

        let callee = match self.next_char()? {
            b'y' => "@callee_unowned",
            b'g' => "@callee_guaranteed",
            b'x' => "@callee_owned",
            b't' => "@convention(thin)",
            _ => return None,
        };
        let conv = self.arena.create_borrowed(Kind::ImplConvention, callee);
        self.arena.add_child(func, conv);

        let attr = match self.peek_char()? {
            b'B' => Some("@convention(block)"),
            b'C' => Some("@convention(c)"),
            b'M' => Some("@convention(method)"),
            b'O' => Some("@convention(objc_method)"),
            b'K' => Some("@convention(closure)"),
            b'W' => Some("@convention(witness_method)"),
            _ => None,
        };
        if let Some(attr) = attr {
            self.next_char();
            let node = self.arena.create_borrowed(Kind::ImplFunctionAttribute, attr);
            self.arena.add_child(func, node);
        }
        if let Some(sig) = gen_sig {
            self.arena.add_child(func, sig);
        }

        let mut num_types = 0;
        while let Some(param) = self.demangle_impl_param_convention() {
            self.arena.add_child(func, param);
            num_types += 1;
        }
        while let Some(result) = self.demangle_impl_result_convention(Kind::ImplResult) {
            self.arena.add_child(func, result);
            num_types += 1;
        }
        if self.next_if(b'z') {
            let error = self.demangle_impl_result_convention(Kind::ImplErrorResult)?;
            self.arena.add_child(func, error);
            num_types += 1;
        }
        if !self.next_if(b'_') {
            return None;
        }

        // The lowered types were mangled in front; attach them back to front.
        for i in 0..num_types {
            let ty = self.pop_kind(Kind::Type)?;
            let num_children = self.arena[func].children().len();
            let slot = self.arena[func].children()[num_children - i - 1];
            self.arena.add_child(slot, ty);
        }
        self.create_type(Some(func))
    }

    fn demangle_impl_param_convention(&mut self) -> Option<NodeId> {
        let attr = match self.peek_char()? {
            b'i' => "@in",
            b'c' => "@in_constant",
            b'l' => "@inout",
            b'b' => "@inout_aliasable",
            b'n' => "@in_guaranteed",
            b'x' => "@owned",
            b'g' => "@guaranteed",
            b'e' => "@deallocating",
            b'y' => "@unowned",
            _ => return None,
        };
        self.next_char();
        let conv = self.arena.create_borrowed(Kind::ImplConvention, attr);
        self.create_with_child(Kind::ImplParameter, Some(conv))
    }

    fn demangle_impl_result_convention(&mut self, kind: Kind) -> Option<NodeId> {
        let attr = match self.peek_char()? {
            b'r' => "@out",
            b'o' => "@owned",
            b'd' => "@unowned",
            b'u' => "@unowned_inner_pointer",
            b'a' => "@autoreleased",
            _ => return None,
        };
        self.next_char();
        let conv = self.arena.create_borrowed(Kind::ImplConvention, attr);
        self.create_with_child(kind, Some(conv))
    }

    // ---- tuples & lists --------------------------------------------------

    /// ```text
    /// <tuple> = 'y' 't'                            // ()
    ///         | <element> '_' <element>* 't'
    /// <element> = <type> <identifier>? 'd'?        // name and variadic mark
    /// ```
    fn pop_tuple(&mut self) -> Option<NodeId> {
        let tuple = self.create(Kind::Tuple);
        if self.pop_kind(Kind::EmptyList).is_none() {
            let mut first = false;
            while !first {
                first = self.pop_kind(Kind::FirstElementMarker).is_some();
                let elem = self.create(Kind::TupleElement);
                if let Some(variadic) = self.pop_kind(Kind::VariadicMarker) {
                    self.arena.add_child(elem, variadic);
                }
                if let Some(ident) = self.pop_kind(Kind::Identifier) {
                    let text = self.arena[ident].text_cow()?.clone();
                    let name = self.create_text_from_cow(Kind::TupleElementName, text);
                    self.arena.add_child(elem, name);
                }
                let ty = self.pop_kind(Kind::Type)?;
                self.arena.add_child(elem, ty);
                self.arena.add_child(tuple, elem);
            }
            self.arena.reverse_children(tuple);
        }
        self.create_type(Some(tuple))
    }

    fn pop_type_list(&mut self) -> Option<NodeId> {
        let list = self.create(Kind::TypeList);
        if self.pop_kind(Kind::EmptyList).is_none() {
            let mut first = false;
            while !first {
                first = self.pop_kind(Kind::FirstElementMarker).is_some();
                let ty = self.pop_kind(Kind::Type)?;
                self.arena.add_child(list, ty);
            }
            self.arena.reverse_children(list);
        }
        Some(list)
    }

    fn pop_protocol(&mut self) -> Option<NodeId> {
        if let Some(ty) = self.pop_kind(Kind::Type) {
            let children = self.arena[ty].children();
            if children.len() != 1 || self.arena[children[0]].kind() != Kind::Protocol {
                return None;
            }
            return Some(ty);
        }
        let name = self.pop_if(is_decl_name);
        let ctx = self.pop_context();
        let proto = self.create_with_children(Kind::Protocol, &[ctx, name])?;
        self.create_type(Some(proto))
    }

    fn demangle_protocol_list_type(&mut self) -> Option<NodeId> {
        let tlist = self.create(Kind::TypeList);
        let plist = self.create_with_child(Kind::ProtocolList, Some(tlist))?;
        if self.pop_kind(Kind::EmptyList).is_none() {
            let mut first = false;
            while !first {
                first = self.pop_kind(Kind::FirstElementMarker).is_some();
                let proto = self.pop_protocol()?;
                self.arena.add_child(tlist, proto);
            }
            self.arena.reverse_children(tlist);
        }
        self.create_type(Some(plist))
    }

    // ---- generic signatures & parameters ---------------------------------

    /// Generic parameters are addressed by (depth, index) into the unnamed
    /// parameter space of the enclosing declaration chain.
    fn dependent_generic_param(&mut self, depth: u64, index: u64) -> NodeId {
        let depth = self.arena.create_index(Kind::Index, depth);
        let index = self.arena.create_index(Kind::Index, index);
        let param = self.create(Kind::DependentGenericParamType);
        self.arena.add_child(param, depth);
        self.arena.add_child(param, index);
        param
    }

    /// ```text
    /// <generic-param> = 'z'                // depth 0, index 0
    ///                 | <index>            // depth 0, index n+1
    ///                 | 'd' <index> <index> // depth n+1, index m
    /// ```
    fn demangle_generic_param_index(&mut self) -> Option<NodeId> {
        if self.next_if(b'd') {
            let depth = self.demangle_index()?.checked_add(1)?;
            let index = self.demangle_index()?;
            return Some(self.dependent_generic_param(depth, index));
        }
        if self.next_if(b'z') {
            return Some(self.dependent_generic_param(0, 0));
        }
        let index = self.demangle_index()?.checked_add(1)?;
        Some(self.dependent_generic_param(0, index))
    }

    fn demangle_generic_signature(&mut self, has_param_counts: bool) -> Option<NodeId> {
        let sig = self.create(Kind::DependentGenericSignature);
        if has_param_counts {
            while !self.next_if(b'l') {
                let mut count = 0;
                if !self.next_if(b'z') {
                    count = self.demangle_index()?.checked_add(1)?;
                }
                let node = self.arena.create_index(Kind::DependentGenericParamCount, count);
                self.arena.add_child(sig, node);
            }
        } else {
            let node = self.arena.create_index(Kind::DependentGenericParamCount, 1);
            self.arena.add_child(sig, node);
        }
        let num_counts = self.arena[sig].children().len();
        while let Some(req) = self.pop_if(is_requirement) {
            self.arena.add_child(sig, req);
        }
        self.arena.reverse_children_from(sig, num_counts);
        Some(sig)
    }

    /// ```text
    /// <requirement> = <constrained-type> <constraint>
    ///
    /// constraint kinds: conformance (default/'p'/'P'/'Q'), base class
    /// ('b'/'c'/'C'/'B'), same type ('s'/'t'/'T'/'S'), layout
    /// ('l'/'m'/'M'/'L' + layout char + sizes)
    /// ```
    fn demangle_generic_requirement(&mut self) -> Option<NodeId> {
        #[derive(Clone, Copy, PartialEq)]
        enum Constraint {
            Protocol,
            BaseClass,
            SameType,
            Layout,
        }
        #[derive(Clone, Copy)]
        enum ConstrainedType {
            Generic,
            Assoc,
            CompoundAssoc,
            Substitution,
        }
        use Constraint::*;
        use ConstrainedType::*;

        let (constraint, ty_kind) = match self.next_char()? {
            b'c' => (BaseClass, Assoc),
            b'C' => (BaseClass, CompoundAssoc),
            b'b' => (BaseClass, Generic),
            b'B' => (BaseClass, Substitution),
            b't' => (SameType, Assoc),
            b'T' => (SameType, CompoundAssoc),
            b's' => (SameType, Generic),
            b'S' => (SameType, Substitution),
            b'm' => (Layout, Assoc),
            b'M' => (Layout, CompoundAssoc),
            b'l' => (Layout, Generic),
            b'L' => (Layout, Substitution),
            b'p' => (Protocol, Assoc),
            b'P' => (Protocol, CompoundAssoc),
            b'Q' => (Protocol, Substitution),
            _ => {
                self.push_back();
                (Protocol, Generic)
            }
        };

        let constr_ty = match ty_kind {
            Generic => {
                let param = self.demangle_generic_param_index()?;
                self.create_type(Some(param))?
            }
            Assoc => {
                let param = self.demangle_generic_param_index()?;
                let ty = self.demangle_associated_type_simple(param)?;
                self.add_substitution(ty);
                ty
            }
            CompoundAssoc => {
                let param = self.demangle_generic_param_index()?;
                let ty = self.demangle_associated_type_compound(param)?;
                self.add_substitution(ty);
                ty
            }
            Substitution => self.pop_kind(Kind::Type)?,
        };

        match constraint {
            Protocol => {
                let proto = self.pop_protocol();
                self.create_with_children(
                    Kind::DependentGenericConformanceRequirement,
                    &[Some(constr_ty), proto],
                )
            }
            BaseClass => {
                let base = self.pop_kind(Kind::Type);
                self.create_with_children(
                    Kind::DependentGenericConformanceRequirement,
                    &[Some(constr_ty), base],
                )
            }
            SameType => {
                let other = self.pop_kind(Kind::Type);
                self.create_with_children(
                    Kind::DependentGenericSameTypeRequirement,
                    &[Some(constr_ty), other],
                )
            }
            Layout => {
                let c = self.next_char()?;
                let mut size = None;
                let mut alignment = None;
                let name = match c {
                    b'U' => "U",
                    b'R' => "R",
                    b'N' => "N",
                    b'C' => "C",
                    b'D' => "D",
                    b'T' => "T",
                    b'E' => {
                        size = Some(self.demangle_index_as_node()?);
                        alignment = Some(self.demangle_index_as_node()?);
                        "E"
                    }
                    b'e' => {
                        size = Some(self.demangle_index_as_node()?);
                        "e"
                    }
                    b'M' => {
                        size = Some(self.demangle_index_as_node()?);
                        alignment = Some(self.demangle_index_as_node()?);
                        "M"
                    }
                    b'm' => {
                        size = Some(self.demangle_index_as_node()?);
                        "m"
                    }
                    _ => return None,
                };
                let name = self.arena.create_borrowed(Kind::Identifier, name);
                let req = self.create_with_children(
                    Kind::DependentGenericLayoutRequirement,
                    &[Some(constr_ty), Some(name)],
                )?;
                if let Some(size) = size {
                    self.arena.add_child(req, size);
                }
                if let Some(alignment) = alignment {
                    self.arena.add_child(req, alignment);
                }
                Some(req)
            }
        }
    }

    fn demangle_generic_type(&mut self) -> Option<NodeId> {
        let gen_sig = self.pop_kind(Kind::DependentGenericSignature);
        let ty = self.pop_kind(Kind::Type);
        let dep = self.create_with_children(Kind::DependentGenericType, &[gen_sig, ty])?;
        self.create_type(Some(dep))
    }

    // ---- archetypes & associated types -----------------------------------

    fn demangle_archetype(&mut self) -> Option<NodeId> {
        match self.next_char()? {
            b'y' => {
                let param = self.demangle_generic_param_index()?;
                let ty = self.demangle_associated_type_simple(param)?;
                self.add_substitution(ty);
                Some(ty)
            }
            b'z' => {
                let param = self.dependent_generic_param(0, 0);
                let ty = self.demangle_associated_type_simple(param)?;
                self.add_substitution(ty);
                Some(ty)
            }
            b'Y' => {
                let param = self.demangle_generic_param_index()?;
                let ty = self.demangle_associated_type_compound(param)?;
                self.add_substitution(ty);
                Some(ty)
            }
            b'Z' => {
                let param = self.dependent_generic_param(0, 0);
                let ty = self.demangle_associated_type_compound(param)?;
                self.add_substitution(ty);
                Some(ty)
            }
            _ => None,
        }
    }

    fn demangle_associated_type_simple(&mut self, base: NodeId) -> Option<NodeId> {
        let base_ty = self.create_type(Some(base))?;
        let name = self.pop_assoc_type_name()?;
        let dep = self.create_with_children(Kind::DependentMemberType, &[Some(base_ty), Some(name)])?;
        self.create_type(Some(dep))
    }

    fn demangle_associated_type_compound(&mut self, base: NodeId) -> Option<NodeId> {
        let mut names = Vec::new();
        let mut first = false;
        while !first {
            first = self.pop_kind(Kind::FirstElementMarker).is_some();
            names.push(self.pop_assoc_type_name()?);
        }
        let mut base = base;
        while let Some(name) = names.pop() {
            let base_ty = self.create_type(Some(base))?;
            let dep = self.create(Kind::DependentMemberType);
            self.arena.add_child(dep, base_ty);
            self.arena.add_child(dep, name);
            base = dep;
        }
        self.create_type(Some(base))
    }

    fn pop_assoc_type_name(&mut self) -> Option<NodeId> {
        let proto = self.pop_kind(Kind::Type);
        if let Some(proto) = proto {
            let children = self.arena[proto].children();
            if children.len() != 1 || self.arena[children[0]].kind() != Kind::Protocol {
                return None;
            }
        }
        let ident = self.pop_kind(Kind::Identifier)?;
        let assoc = self.create_with_child(Kind::DependentAssociatedTypeRef, Some(ident))?;
        if let Some(proto) = proto {
            self.arena.add_child(assoc, proto);
        }
        Some(assoc)
    }

    // ---- metatypes & metadata --------------------------------------------

    fn demangle_metadata(&mut self) -> Option<NodeId> {
        match self.next_char()? {
            b'a' => self.create_with_popped_type(Kind::TypeMetadataAccessFunction),
            b'f' => self.create_with_popped_type(Kind::FullTypeMetadata),
            b'L' => self.create_with_popped_type(Kind::TypeMetadataLazyCache),
            b'm' => self.create_with_popped_type(Kind::Metaclass),
            b'n' => self.create_with_popped_type(Kind::NominalTypeDescriptor),
            b'P' => self.create_with_popped_type(Kind::GenericTypeMetadataPattern),
            b'p' => {
                let proto = self.pop_protocol();
                self.create_with_child(Kind::ProtocolDescriptor, proto)
            }
            _ => None,
        }
    }

    fn demangle_metatype_representation(&mut self) -> Option<NodeId> {
        let repr = match self.next_char()? {
            b't' => "@thin",
            b'T' => "@thick",
            b'o' => "@objc_metatype",
            _ => return None,
        };
        Some(self.arena.create_borrowed(Kind::MetatypeRepresentation, repr))
    }

    // ---- special types ---------------------------------------------------

    fn demangle_special_type(&mut self) -> Option<NodeId> {
        match self.next_char()? {
            b'f' => self.pop_function_type(Kind::ThinFunctionType),
            b'K' => self.pop_function_type(Kind::AutoClosureType),
            b'U' => self.pop_function_type(Kind::UncurriedFunctionType),
            b'B' => self.pop_function_type(Kind::ObjCBlock),
            b'C' => self.pop_function_type(Kind::CFunctionPointer),
            b'o' => {
                let ty = self.pop_kind(Kind::Type);
                let node = self.create_with_child(Kind::Unowned, ty);
                self.create_type(node)
            }
            b'u' => {
                let ty = self.pop_kind(Kind::Type);
                let node = self.create_with_child(Kind::Unmanaged, ty);
                self.create_type(node)
            }
            b'w' => {
                let ty = self.pop_kind(Kind::Type);
                let node = self.create_with_child(Kind::Weak, ty);
                self.create_type(node)
            }
            b'b' => {
                let ty = self.pop_kind(Kind::Type);
                let node = self.create_with_child(Kind::SILBoxType, ty);
                self.create_type(node)
            }
            b'D' => {
                let ty = self.pop_kind(Kind::Type);
                let node = self.create_with_child(Kind::DynamicSelf, ty);
                self.create_type(node)
            }
            b'M' => {
                let repr = self.demangle_metatype_representation()?;
                let ty = self.pop_kind(Kind::Type);
                let node = self.create_with_children(Kind::Metatype, &[Some(repr), ty])?;
                self.create_type(Some(node))
            }
            b'm' => {
                let repr = self.demangle_metatype_representation()?;
                let ty = self.pop_kind(Kind::Type);
                let node =
                    self.create_with_children(Kind::ExistentialMetatype, &[Some(repr), ty])?;
                self.create_type(Some(node))
            }
            b'p' => {
                let ty = self.pop_kind(Kind::Type);
                let node = self.create_with_child(Kind::ExistentialMetatype, ty);
                self.create_type(node)
            }
            _ => None,
        }
    }

    // ---- builtins --------------------------------------------------------

    fn demangle_builtin_type(&mut self) -> Option<NodeId> {
        let node = match self.next_char()? {
            b'b' => self.arena.create_borrowed(Kind::BuiltinTypeName, "Builtin.BridgeObject"),
            b'B' => self
                .arena
                .create_borrowed(Kind::BuiltinTypeName, "Builtin.UnsafeValueBuffer"),
            b'O' => self
                .arena
                .create_borrowed(Kind::BuiltinTypeName, "Builtin.UnknownObject"),
            b'o' => self
                .arena
                .create_borrowed(Kind::BuiltinTypeName, "Builtin.NativeObject"),
            b'p' => self.arena.create_borrowed(Kind::BuiltinTypeName, "Builtin.RawPointer"),
            b'w' => self.arena.create_borrowed(Kind::BuiltinTypeName, "Builtin.Word"),
            b'f' => {
                let bits = self.demangle_index()?.checked_sub(1)?;
                if bits == 0 {
                    return None;
                }
                self.arena
                    .create_text(Kind::BuiltinTypeName, format!("Builtin.Float{bits}"))
            }
            b'i' => {
                let bits = self.demangle_index()?.checked_sub(1)?;
                if bits == 0 {
                    return None;
                }
                self.arena
                    .create_text(Kind::BuiltinTypeName, format!("Builtin.Int{bits}"))
            }
            b'v' => {
                let elts = self.demangle_index()?.checked_sub(1)?;
                if elts == 0 {
                    return None;
                }
                let elem = self.pop_type_and_get_child()?;
                let name = {
                    let node = &self.arena[elem];
                    if node.kind() != Kind::BuiltinTypeName {
                        return None;
                    }
                    let elem_name = node.text()?.strip_prefix("Builtin.")?;
                    format!("Builtin.Vec{elts}x{elem_name}")
                };
                self.arena.create_text(Kind::BuiltinTypeName, name)
            }
            _ => return None,
        };
        self.create_type(Some(node))
    }

    // ---- entities --------------------------------------------------------

    fn demangle_entity(&mut self, kind: Kind) -> Option<NodeId> {
        let ty = self.pop_kind(Kind::Type)?;
        let name = self.pop_if(is_decl_name)?;
        let ctx = self.pop_context()?;
        self.create_with_children(kind, &[Some(ctx), Some(name), Some(ty)])
    }

    fn demangle_function_entity(&mut self) -> Option<NodeId> {
        enum Args {
            None,
            TypeAndMaybePrivateName,
            TypeAndName,
            TypeAndIndex,
            Index,
        }

        let (args, kind) = match self.next_char()? {
            b'D' => (Args::None, Kind::Deallocator),
            b'd' => (Args::None, Kind::Destructor),
            b'E' => (Args::None, Kind::IVarDestroyer),
            b'e' => (Args::None, Kind::IVarInitializer),
            b'i' => (Args::None, Kind::Initializer),
            b'C' => (Args::TypeAndMaybePrivateName, Kind::Allocator),
            b'c' => (Args::TypeAndMaybePrivateName, Kind::Constructor),
            b'g' => (Args::TypeAndName, Kind::Getter),
            b'G' => (Args::TypeAndName, Kind::GlobalGetter),
            b's' => (Args::TypeAndName, Kind::Setter),
            b'm' => (Args::TypeAndName, Kind::MaterializeForSet),
            b'w' => (Args::TypeAndName, Kind::WillSet),
            b'W' => (Args::TypeAndName, Kind::DidSet),
            b'a' => (Args::TypeAndName, Kind::MutableAddressor),
            b'l' => (Args::TypeAndName, Kind::OwningAddressor),
            b'U' => (Args::TypeAndIndex, Kind::ExplicitClosure),
            b'u' => (Args::TypeAndIndex, Kind::ImplicitClosure),
            b'A' => (Args::Index, Kind::DefaultArgumentInitializer),
            b'p' => return self.demangle_entity(Kind::GenericTypeParamDecl),
            _ => return None,
        };

        let mut name_or_index = None;
        let mut param_type = None;
        match args {
            Args::None => {}
            Args::TypeAndMaybePrivateName => {
                param_type = Some(self.pop_kind(Kind::Type)?);
                name_or_index = self.pop_kind(Kind::PrivateDeclName);
            }
            Args::TypeAndName => {
                param_type = Some(self.pop_kind(Kind::Type)?);
                name_or_index = Some(self.pop_if(is_decl_name)?);
            }
            Args::TypeAndIndex => {
                name_or_index = Some(self.demangle_index_as_node()?);
                param_type = Some(self.pop_kind(Kind::Type)?);
            }
            Args::Index => {
                name_or_index = Some(self.demangle_index_as_node()?);
            }
        }

        let ctx = self.pop_context()?;
        let entity = self.create_with_child(kind, Some(ctx))?;
        if let Some(name) = name_or_index {
            self.arena.add_child(entity, name);
        }
        if let Some(ty) = param_type {
            self.arena.add_child(entity, ty);
        }
        Some(entity)
    }

    // ---- thunks & specializations ----------------------------------------

    /// Every `T` production is a wrapper: it pops the entity it decorates
    /// and makes it its first child, so a decorated symbol still finishes
    /// the parse as a single node.
    fn demangle_thunk_or_specialization(&mut self) -> Option<NodeId> {
        match self.next_char()? {
            b'c' => {
                let entity = self.pop_if(is_entity);
                self.create_with_child(Kind::CurryThunk, entity)
            }
            b'o' => {
                let entity = self.pop_if(is_entity);
                self.create_with_child(Kind::ObjCAttribute, entity)
            }
            b'O' => {
                let entity = self.pop_if(is_entity);
                self.create_with_child(Kind::NonObjCAttribute, entity)
            }
            b'D' => {
                let entity = self.pop_if(is_entity);
                self.create_with_child(Kind::DynamicAttribute, entity)
            }
            b'd' => {
                let entity = self.pop_if(is_entity);
                self.create_with_child(Kind::DirectMethodReferenceAttribute, entity)
            }
            b'A' => {
                let entity = self.pop_if(is_entity);
                self.create_with_child(Kind::PartialApplyForwarder, entity)
            }
            b'a' => {
                let entity = self.pop_if(is_entity);
                self.create_with_child(Kind::PartialApplyObjCForwarder, entity)
            }
            b'W' => {
                let entity = self.pop_if(is_entity)?;
                let conf = self.pop_protocol_conformance()?;
                self.create_with_children(Kind::ProtocolWitness, &[Some(conf), Some(entity)])
            }
            c @ (b'R' | b'r') => {
                let kind = if c == b'R' {
                    Kind::ReabstractionThunkHelper
                } else {
                    Kind::ReabstractionThunk
                };
                let thunk = self.create(kind);
                if let Some(sig) = self.pop_kind(Kind::DependentGenericSignature) {
                    self.arena.add_child(thunk, sig);
                }
                let to_ty = self.pop_kind(Kind::Type)?;
                let from_ty = self.pop_kind(Kind::Type)?;
                self.arena.add_child(thunk, from_ty);
                self.arena.add_child(thunk, to_ty);
                Some(thunk)
            }
            b'g' => self.demangle_generic_specialization(Kind::GenericSpecialization),
            b'G' => {
                self.demangle_generic_specialization(Kind::GenericSpecializationNotReAbstracted)
            }
            b'f' => self.demangle_function_specialization(),
            _ => None,
        }
    }

    fn demangle_spec_attributes(&mut self, demangle_unique_id: bool) -> Option<(bool, u64, Option<u64>)> {
        let is_fragile = self.next_if(b'q');
        let pass_id = match self.next_char()? {
            c @ b'0'..=b'9' => u64::from(c - b'0'),
            _ => return None,
        };
        let unique_id = if demangle_unique_id {
            self.demangle_natural()
        } else {
            None
        };
        Some((is_fragile, pass_id, unique_id))
    }

    /// ```text
    /// <generic-specialization> = <entity> <type>* '_' 'T' ('g' | 'G')
    ///                            'q'? <pass-id>
    /// ```
    fn demangle_generic_specialization(&mut self, kind: Kind) -> Option<NodeId> {
        let (is_fragile, pass_id, _) = self.demangle_spec_attributes(false)?;
        let tlist = self.pop_type_list()?;
        let entity = self.pop_if(is_entity)?;

        let spec = self.create(kind);
        self.arena.add_child(spec, entity);
        if is_fragile {
            let fragile = self.create(Kind::SpecializationIsFragile);
            self.arena.add_child(spec, fragile);
        }
        let pass = self.arena.create_index(Kind::SpecializationPassID, pass_id);
        self.arena.add_child(spec, pass);

        let args: Vec<NodeId> = self.arena[tlist].children().to_vec();
        for arg in args {
            let param = self.create_with_child(Kind::GenericSpecializationParam, Some(arg))?;
            self.arena.add_child(spec, param);
        }
        Some(spec)
    }

    /// ```text
    /// <function-specialization> = <entity> <payload>* 'T' 'f' 'q'?
    ///                             <pass-id> <natural>? <param-spec>* '_'
    /// ```
    fn demangle_function_specialization(&mut self) -> Option<NodeId> {
        let (is_fragile, pass_id, unique_id) = self.demangle_spec_attributes(true)?;
        let mut params = Vec::new();
        while !self.next_if(b'_') {
            let param = self.demangle_func_spec_param(params.len() as u64)?;
            params.push(param);
        }
        let entity = self.pop_if(is_entity)?;

        let spec = self.create(Kind::FunctionSignatureSpecialization);
        self.arena.add_child(spec, entity);
        if is_fragile {
            let fragile = self.create(Kind::SpecializationIsFragile);
            self.arena.add_child(spec, fragile);
        }
        let pass = self.arena.create_index(Kind::SpecializationPassID, pass_id);
        self.arena.add_child(spec, pass);
        if let Some(unique_id) = unique_id {
            let node = self.arena.create_index(Kind::Index, unique_id);
            self.arena.add_child(spec, node);
        }
        for param in params {
            self.arena.add_child(spec, param);
        }
        Some(spec)
    }

    /// ```text
    /// <param-spec> = 'n'                           // unmodified
    ///              | 'c'                           // closure propagated
    ///              | 'p' ('f'|'g'|'i'|'d'|'s')     // constant propagated
    ///              | 'd' 'G'? 'X'?                 // dead (+ownership, +sroa)
    ///              | 'g' 'X'?                      // owned -> guaranteed
    ///              | 'x'                           // sroa
    ///              | 'i' | 's'                     // box to value / stack
    /// ```
    fn demangle_func_spec_param(&mut self, param_idx: u64) -> Option<NodeId> {
        let param = self.create(Kind::FunctionSignatureSpecializationParam);
        let index = self.arena.create_index(Kind::Index, param_idx);
        self.arena.add_child(param, index);

        let add_kind = |this: &mut Self, bits: u64| {
            let node = this
                .arena
                .create_index(Kind::FunctionSignatureSpecializationParamKind, bits);
            this.arena.add_child(param, node);
        };

        match self.next_char()? {
            b'n' => {}
            b'c' => {
                // closure propagated: the closure's name and argument types
                // were mangled in front of the specialization suffix
                add_kind(self, SpecializationParamKind::ClosureProp as u64);
                let name = self.pop_kind(Kind::Identifier)?;
                let text = self.arena[name].text_cow()?.clone();
                let payload = self
                    .create_text_from_cow(Kind::FunctionSignatureSpecializationParamPayload, text);
                self.arena.add_child(param, payload);
                while let Some(ty) = self.pop_kind(Kind::Type) {
                    self.arena.add_child(param, ty);
                }
            }
            b'p' => match self.next_char()? {
                b'f' => {
                    add_kind(self, SpecializationParamKind::ConstantPropFunction as u64);
                    let name = self.pop_kind(Kind::Identifier)?;
                    let text = self.arena[name].text_cow()?.clone();
                    let payload = self.create_text_from_cow(
                        Kind::FunctionSignatureSpecializationParamPayload,
                        text,
                    );
                    self.arena.add_child(param, payload);
                }
                b'g' => {
                    add_kind(self, SpecializationParamKind::ConstantPropGlobal as u64);
                    let name = self.pop_kind(Kind::Identifier)?;
                    let text = self.arena[name].text_cow()?.clone();
                    let payload = self.create_text_from_cow(
                        Kind::FunctionSignatureSpecializationParamPayload,
                        text,
                    );
                    self.arena.add_child(param, payload);
                }
                b'i' => {
                    add_kind(self, SpecializationParamKind::ConstantPropInteger as u64);
                    let value = self.demangle_natural()?;
                    let payload = self.arena.create_text(
                        Kind::FunctionSignatureSpecializationParamPayload,
                        value.to_string(),
                    );
                    self.arena.add_child(param, payload);
                }
                b'd' => {
                    add_kind(self, SpecializationParamKind::ConstantPropFloat as u64);
                    let mut digits = String::new();
                    while let Some(c @ (b'0'..=b'9' | b'.')) = self.peek_char() {
                        digits.push(c as char);
                        self.next_char();
                    }
                    if digits.is_empty() {
                        return None;
                    }
                    let payload = self
                        .arena
                        .create_text(Kind::FunctionSignatureSpecializationParamPayload, digits);
                    self.arena.add_child(param, payload);
                }
                b's' => {
                    add_kind(self, SpecializationParamKind::ConstantPropString as u64);
                    let encoding = match self.next_char()? {
                        b'b' => "u8",
                        b'w' => "u16",
                        b'c' => "objc",
                        _ => return None,
                    };
                    let name = self.pop_kind(Kind::Identifier)?;
                    let text = self.arena[name].text_cow()?.clone();
                    let payload = self.create_text_from_cow(
                        Kind::FunctionSignatureSpecializationParamPayload,
                        text,
                    );
                    self.arena.add_child(param, payload);
                    let enc = self
                        .arena
                        .create_text(Kind::FunctionSignatureSpecializationParamPayload, encoding.into());
                    self.arena.add_child(param, enc);
                }
                _ => return None,
            },
            b'd' => {
                let mut bits = 1 << 6; // dead
                if self.next_if(b'G') {
                    bits |= 1 << 7; // owned -> guaranteed
                }
                if self.next_if(b'X') {
                    bits |= 1 << 8; // sroa
                }
                add_kind(self, bits);
            }
            b'g' => {
                let mut bits = 1 << 7;
                if self.next_if(b'X') {
                    bits |= 1 << 8;
                }
                add_kind(self, bits);
            }
            b'x' => add_kind(self, 1 << 8),
            b'i' => add_kind(self, SpecializationParamKind::BoxToValue as u64),
            b's' => add_kind(self, SpecializationParamKind::BoxToStack as u64),
            _ => return None,
        }
        Some(param)
    }

    // ---- witnesses -------------------------------------------------------

    fn pop_protocol_conformance(&mut self) -> Option<NodeId> {
        let gen_sig = self.pop_kind(Kind::DependentGenericSignature);
        let module = self.pop_module();
        let proto = self.pop_protocol();
        let mut ty = self.pop_kind(Kind::Type);
        let mut ident = None;
        if ty.is_none() {
            // initializer conformances carry a property name in front
            ident = self.pop_kind(Kind::Identifier);
            ty = self.pop_kind(Kind::Type);
        }
        if let Some(sig) = gen_sig {
            let dep = self.create_with_children(Kind::DependentGenericType, &[Some(sig), ty])?;
            ty = self.create_type(Some(dep));
        }
        let conf = self.create_with_children(Kind::ProtocolConformance, &[ty, proto, module])?;
        if let Some(ident) = ident {
            self.arena.add_child(conf, ident);
        }
        Some(conf)
    }

    fn demangle_witness(&mut self) -> Option<NodeId> {
        match self.next_char()? {
            b'V' => self.create_with_popped_type(Kind::ValueWitnessTable),
            b'v' => {
                let directness = match self.next_char()? {
                    b'd' => 0, // direct
                    b'i' => 1, // indirect
                    _ => return None,
                };
                let direct = self.arena.create_index(Kind::Directness, directness);
                let entity = self.pop_if(is_entity);
                self.create_with_children(Kind::FieldOffset, &[Some(direct), entity])
            }
            b'P' => {
                let conf = self.pop_protocol_conformance();
                self.create_with_child(Kind::ProtocolWitnessTable, conf)
            }
            b'G' => {
                let conf = self.pop_protocol_conformance();
                self.create_with_child(Kind::GenericProtocolWitnessTable, conf)
            }
            b'I' => {
                let conf = self.pop_protocol_conformance();
                self.create_with_child(
                    Kind::GenericProtocolWitnessTableInstantiationFunction,
                    conf,
                )
            }
            b'a' => {
                let conf = self.pop_protocol_conformance();
                self.create_with_child(Kind::ProtocolWitnessTableAccessor, conf)
            }
            b'l' => {
                let conf = self.pop_protocol_conformance();
                let ty = self.pop_kind(Kind::Type);
                self.create_with_children(Kind::LazyProtocolWitnessTableAccessor, &[ty, conf])
            }
            b'L' => {
                let conf = self.pop_protocol_conformance();
                let ty = self.pop_kind(Kind::Type);
                self.create_with_children(Kind::LazyProtocolWitnessTableCacheVariable, &[ty, conf])
            }
            b't' => {
                let name = self.pop_if(is_decl_name);
                let conf = self.pop_protocol_conformance();
                self.create_with_children(Kind::AssociatedTypeMetadataAccessor, &[conf, name])
            }
            b'T' => {
                let proto = self.pop_protocol();
                let name = self.pop_if(is_decl_name);
                let conf = self.pop_protocol_conformance();
                self.create_with_children(
                    Kind::AssociatedTypeWitnessTableAccessor,
                    &[conf, name, proto],
                )
            }
            _ => None,
        }
    }

    fn demangle_value_witness(&mut self) -> Option<NodeId> {
        let code = [self.next_char()?, self.next_char()?];
        let kind = ValueWitnessKind::from_code(&code)?;
        let index = self.arena.create_index(Kind::Index, kind as u64);
        let ty = self.pop_kind(Kind::Type);
        self.create_with_children(Kind::ValueWitness, &[Some(index), ty])
    }

    // ---- Objective-C type names ------------------------------------------

    /// ```text
    /// <objc-type-name> = 'C' <module> <identifier>
    ///                  | 'P' <module> <identifier> '_'
    /// <module>         = 's' | <identifier>
    /// ```
    fn demangle_objc_type_name(&mut self) -> Option<NodeId> {
        let ty = self.create(Kind::Type);
        let global = self.create(Kind::Global);
        let mangling = self.create_with_child(Kind::TypeMangling, Some(ty))?;
        self.arena.add_child(global, mangling);

        let nominal;
        let is_proto;
        if self.next_if(b'C') {
            is_proto = false;
            nominal = self.create(Kind::Class);
            self.arena.add_child(ty, nominal);
        } else if self.next_if(b'P') {
            is_proto = true;
            nominal = self.create(Kind::Protocol);
            let proto_ty = self.create_type(Some(nominal))?;
            let tlist = self.create_with_child(Kind::TypeList, Some(proto_ty))?;
            let plist = self.create_with_child(Kind::ProtocolList, Some(tlist))?;
            self.arena.add_child(ty, plist);
        } else {
            return None;
        }

        if self.next_if(b's') {
            let module = self.arena.create_borrowed(Kind::Module, "Swift");
            self.arena.add_child(nominal, module);
        } else {
            let ident = self.demangle_identifier()?;
            let module = self.change_kind(ident, Kind::Module);
            self.arena.add_child(nominal, module);
        }
        let ident = self.demangle_identifier()?;
        self.arena.add_child(nominal, ident);

        if is_proto && !self.next_if(b'_') {
            return None;
        }
        if !self.at_end() {
            return None;
        }
        Some(global)
    }
}
