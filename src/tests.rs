#![cfg(test)]

use super::*;

macro_rules! demangles {
    ($mangled:literal) => {
        demangle_symbol($mangled)
            .unwrap_or_else(|| panic!("Demangling '{}' failed.", $mangled))
    };
}

macro_rules! demangles_type {
    ($mangled:literal) => {
        demangle_type($mangled)
            .unwrap_or_else(|| panic!("Demangling type '{}' failed.", $mangled))
    };
}

macro_rules! none {
    ($mangled:literal) => {
        if demangle_symbol($mangled).is_some() {
            panic!("Demangling '{}' succeeded when it wasn't supposed to.", $mangled);
        }
    };
}

macro_rules! none_type {
    ($mangled:literal) => {
        if demangle_type($mangled).is_some() {
            panic!("Demangling type '{}' succeeded when it wasn't supposed to.", $mangled);
        }
    };
}

#[test]
fn simple_function() {
    let symbol = demangles!("_T04main3fooyyF");
    let root = symbol.root();
    assert_eq!(root.kind(), Kind::Global);
    assert_eq!(root.num_children(), 1);

    let func = root.child(0).unwrap();
    assert_eq!(func.kind(), Kind::Function);
    assert_eq!(func.num_children(), 3);
    assert_eq!(func.child(0).unwrap().kind(), Kind::Module);
    assert_eq!(func.child(0).unwrap().text(), Some("main"));
    assert_eq!(func.child(1).unwrap().kind(), Kind::Identifier);
    assert_eq!(func.child(1).unwrap().text(), Some("foo"));

    let ty = func.child(2).unwrap();
    assert_eq!(ty.kind(), Kind::Type);
    let func_ty = ty.child(0).unwrap();
    assert_eq!(func_ty.kind(), Kind::FunctionType);
    assert_eq!(func_ty.child(0).unwrap().kind(), Kind::ArgumentTuple);
    assert_eq!(func_ty.child(1).unwrap().kind(), Kind::ReturnType);
}

#[test]
fn prefixes() {
    assert!(demangle_symbol("$s4main3fooyyF").is_some());
    assert!(demangle_symbol("$S4main3fooyyF").is_some());
    none!("_X04main3fooyyF");
    none!("4main3fooyyF");
}

#[test]
fn nominal_in_module() {
    let ty = demangles_type!("4main3BarV");
    let root = ty.root();
    assert_eq!(root.kind(), Kind::Type);

    let nominal = root.child(0).unwrap();
    assert_eq!(nominal.kind(), Kind::Structure);
    assert_eq!(nominal.child(0).unwrap().kind(), Kind::Module);
    assert_eq!(nominal.child(0).unwrap().text(), Some("main"));
    assert_eq!(nominal.child(1).unwrap().text(), Some("Bar"));
}

#[test]
fn known_types() {
    for (mangled, name) in [("Si", "Int"), ("Sb", "Bool"), ("SS", "String")] {
        let ty = demangle_type(mangled).unwrap();
        let nominal = ty.root().child(0).unwrap();
        assert_eq!(nominal.kind(), Kind::Structure);
        assert_eq!(nominal.child(0).unwrap().text(), Some("Swift"));
        assert_eq!(nominal.child(1).unwrap().text(), Some(name));
    }

    let optional = demangles_type!("Sq");
    assert_eq!(optional.root().child(0).unwrap().kind(), Kind::Enum);
}

#[test]
fn bound_generic() {
    // Array<Int>
    let ty = demangles_type!("SaySiG");
    let bound = ty.root().child(0).unwrap();
    assert_eq!(bound.kind(), Kind::BoundGenericStructure);
    assert_eq!(bound.num_children(), 2);

    let nominal = bound.child(0).unwrap().child(0).unwrap();
    assert_eq!(nominal.kind(), Kind::Structure);
    assert_eq!(nominal.child(1).unwrap().text(), Some("Array"));

    let args = bound.child(1).unwrap();
    assert_eq!(args.kind(), Kind::TypeList);
    assert_eq!(args.num_children(), 1);
    let arg = args.child(0).unwrap().child(0).unwrap();
    assert_eq!(arg.child(1).unwrap().text(), Some("Int"));
}

#[test]
fn bound_generic_nested() {
    // Outer<Int>.Inner<Bool>: outermost argument list comes first
    let ty = demangles_type!("4main5OuterV5InnerVySi_SbG");
    let inner = ty.root().child(0).unwrap();
    assert_eq!(inner.kind(), Kind::BoundGenericStructure);

    let inner_args = inner.child(1).unwrap();
    assert_eq!(inner_args.num_children(), 1);
    let inner_arg = inner_args.child(0).unwrap().child(0).unwrap();
    assert_eq!(inner_arg.child(1).unwrap().text(), Some("Bool"));

    let inner_nominal = inner.child(0).unwrap().child(0).unwrap();
    assert_eq!(inner_nominal.kind(), Kind::Structure);
    let outer = inner_nominal.child(0).unwrap();
    assert_eq!(outer.kind(), Kind::BoundGenericStructure);
    let outer_arg = outer.child(1).unwrap().child(0).unwrap().child(0).unwrap();
    assert_eq!(outer_arg.child(1).unwrap().text(), Some("Int"));
}

#[test]
fn substitution_shares_nodes() {
    // (Foo, Foo) with the second element spelled as a back-reference
    let ty = demangles_type!("4main3FooV_ACt");
    let tuple = ty.root().child(0).unwrap();
    assert_eq!(tuple.kind(), Kind::Tuple);
    assert_eq!(tuple.num_children(), 2);

    let first = tuple.child(0).unwrap();
    let second = tuple.child(1).unwrap();
    assert_eq!(first, second);

    // reference sharing, not a structural copy
    assert_eq!(
        first.child(0).unwrap().id(),
        second.child(0).unwrap().id()
    );
}

#[test]
fn multi_substitutions() {
    // one opcode pushing the same subtree twice, and the repeat-count form
    let a = demangles_type!("4main3FooV_AcCt");
    let b = demangles_type!("4main3FooV_A2Ct");
    assert_eq!(a.root(), b.root());

    let tuple = a.root().child(0).unwrap();
    assert_eq!(tuple.num_children(), 3);
    let first = tuple.child(0).unwrap().child(0).unwrap();
    let third = tuple.child(2).unwrap().child(0).unwrap();
    assert_eq!(first.id(), third.id());
}

#[test]
fn dangling_backreference() {
    none_type!("AB");
    none_type!("3FooAD");
    none!("_T04main3FooV_AGt");
}

#[test]
fn word_substitution() {
    // "MyStruct" spelled out, then reassembled from its two words
    let ty = demangles_type!("4main8MyStructV_4main0bC0Vt");
    let tuple = ty.root().child(0).unwrap();
    assert_eq!(tuple.num_children(), 2);

    let first = tuple.child(0).unwrap();
    let second = tuple.child(1).unwrap();
    // structurally identical, but distinct nodes
    assert_eq!(first, second);
    assert_ne!(first.child(0).unwrap().id(), second.child(0).unwrap().id());

    let name = second.child(0).unwrap().child(0).unwrap().child(1).unwrap();
    assert_eq!(name.text(), Some("MyStruct"));
}

#[test]
fn word_table_is_bounded() {
    // 27 fragments: the 26th is still addressable as 'z', the 27th is
    // silently dropped rather than an error
    let ty = demangles_type!(
        "Si54AaBbCcDdEeFfGgHhIiJjKkLlMmNnOoPpQqRrSsTtUuVvWwXxYyZzAb_Sb0z0t"
    );
    let tuple = ty.root().child(0).unwrap();
    assert_eq!(tuple.num_children(), 2);

    let long_name = tuple.child(0).unwrap().child(0).unwrap();
    assert_eq!(long_name.kind(), Kind::TupleElementName);
    assert_eq!(
        long_name.text(),
        Some("AaBbCcDdEeFfGgHhIiJjKkLlMmNnOoPpQqRrSsTtUuVvWwXxYyZzAb")
    );

    let short_name = tuple.child(1).unwrap().child(0).unwrap();
    assert_eq!(short_name.text(), Some("Zz"));
}

#[test]
fn stack_count_invariant() {
    // input exhausted with two nodes remaining
    none_type!("SiSb");
    none!("_T0SiSb");
}

#[test]
fn minimal_leaf() {
    let ty = demangles_type!("y");
    let root = ty.root();
    assert_eq!(root.kind(), Kind::EmptyList);
    assert_eq!(root.num_children(), 0);
    assert_eq!(root.index(), None);
    assert_eq!(root.text(), None);
}

#[test]
fn malformed_inputs() {
    none!("");
    none_type!("");
    none!("_T0");
    none_type!("3Fo"); // truncated identifier
    none_type!("7");
    none_type!("Si!"); // unknown operator
    none_type!("t"); // tuple with no elements on the stack
    none_type!("日本"); // not a mangled name at all
}

#[test]
fn arena_reuse() {
    let mut arena = NodeArena::new();

    let a = demangle_type_in(&mut arena, "Si").unwrap();
    let b = demangle_type_in(&mut arena, "Sb").unwrap();
    // batch mode: both trees stay alive in the shared arena
    assert_eq!(arena.node(a).child(0).unwrap().child(1).unwrap().text(), Some("Int"));
    assert_eq!(arena.node(b).child(0).unwrap().child(1).unwrap().text(), Some("Bool"));

    // a reset invalidates everything; the next parse is unaffected
    arena.reset();
    let c = demangle_type_in(&mut arena, "SS").unwrap();
    assert_eq!(arena.node(c).child(0).unwrap().child(1).unwrap().text(), Some("String"));
}

#[test]
fn failed_parse_leaves_instance_reusable() {
    let mut arena = NodeArena::new();
    assert!(demangle_type_in(&mut arena, "AB").is_none());
    let ok = demangle_type_in(&mut arena, "Si").unwrap();
    assert_eq!(arena.node(ok).child(0).unwrap().child(1).unwrap().text(), Some("Int"));
}

#[test]
fn generic_function() {
    let symbol = demangles!("_T04main3fooyxlF");
    let func = symbol.root().child(0).unwrap();
    assert_eq!(func.kind(), Kind::Function);

    let dep = func.child(2).unwrap().child(0).unwrap();
    assert_eq!(dep.kind(), Kind::DependentGenericType);
    let sig = dep.child(0).unwrap();
    assert_eq!(sig.kind(), Kind::DependentGenericSignature);
    assert_eq!(sig.child(0).unwrap().index(), Some(1));
    assert_eq!(dep.child(1).unwrap().child(0).unwrap().kind(), Kind::FunctionType);
}

#[test]
fn generic_param_depth_index() {
    let ty = demangles_type!("qd__");
    let param = ty.root().child(0).unwrap();
    assert_eq!(param.kind(), Kind::DependentGenericParamType);
    assert_eq!(param.child(0).unwrap().index(), Some(1));
    assert_eq!(param.child(1).unwrap().index(), Some(0));

    let ty = demangles_type!("x");
    let param = ty.root().child(0).unwrap();
    assert_eq!(param.child(0).unwrap().index(), Some(0));
    assert_eq!(param.child(1).unwrap().index(), Some(0));
}

#[test]
fn generic_requirements() {
    // <A where A: Bar> A
    let ty = demangles_type!("x4main3BarPRzlu");
    let dep = ty.root().child(0).unwrap();
    assert_eq!(dep.kind(), Kind::DependentGenericType);

    let sig = dep.child(0).unwrap();
    assert_eq!(sig.kind(), Kind::DependentGenericSignature);
    assert_eq!(sig.num_children(), 2);

    let req = sig.child(1).unwrap();
    assert_eq!(req.kind(), Kind::DependentGenericConformanceRequirement);
    let proto = req.child(1).unwrap().child(0).unwrap();
    assert_eq!(proto.kind(), Kind::Protocol);
    assert_eq!(proto.child(1).unwrap().text(), Some("Bar"));
}

#[test]
fn operator_function() {
    let symbol = demangles!("_T04main1poiyyF");
    let func = symbol.root().child(0).unwrap();
    let name = func.child(1).unwrap();
    assert_eq!(name.kind(), Kind::InfixOperator);
    assert_eq!(name.text(), Some("+"));
}

#[test]
fn private_and_local_names() {
    let symbol = demangles!("_T04main3foo4hashLLSiv");
    let var = symbol.root().child(0).unwrap();
    assert_eq!(var.kind(), Kind::Variable);

    let name = var.child(1).unwrap();
    assert_eq!(name.kind(), Kind::PrivateDeclName);
    assert_eq!(name.child(0).unwrap().text(), Some("hash"));
    assert_eq!(name.child(1).unwrap().text(), Some("foo"));

    let ty = demangles_type!("3fooL_");
    let local = ty.root();
    assert_eq!(local.kind(), Kind::LocalDeclName);
    assert_eq!(local.child(0).unwrap().index(), Some(0));
    assert_eq!(local.child(1).unwrap().text(), Some("foo"));
}

#[test]
fn accessors_and_static() {
    let symbol = demangles!("_T04main1xSifg");
    let getter = symbol.root().child(0).unwrap();
    assert_eq!(getter.kind(), Kind::Getter);
    assert_eq!(getter.child(1).unwrap().text(), Some("x"));

    let symbol = demangles!("_T04main1xSivZ");
    let stat = symbol.root().child(0).unwrap();
    assert_eq!(stat.kind(), Kind::Static);
    assert_eq!(stat.child(0).unwrap().kind(), Kind::Variable);
}

#[test]
fn extension_context() {
    let symbol = demangles!("_T04main3FooV4mainE1xSiv");
    let var = symbol.root().child(0).unwrap();
    assert_eq!(var.kind(), Kind::Variable);

    let ext = var.child(0).unwrap();
    assert_eq!(ext.kind(), Kind::Extension);
    assert_eq!(ext.child(0).unwrap().kind(), Kind::Module);
    assert_eq!(ext.child(1).unwrap().kind(), Kind::Structure);
}

#[test]
fn tuples() {
    let ty = demangles_type!("Si3foo_SS3bart");
    let tuple = ty.root().child(0).unwrap();
    assert_eq!(tuple.kind(), Kind::Tuple);
    assert_eq!(tuple.num_children(), 2);

    let first = tuple.child(0).unwrap();
    assert_eq!(first.child(0).unwrap().text(), Some("foo"));
    let int = first.child(1).unwrap().child(0).unwrap();
    assert_eq!(int.child(1).unwrap().text(), Some("Int"));

    let second = tuple.child(1).unwrap();
    assert_eq!(second.child(0).unwrap().text(), Some("bar"));

    // the empty tuple
    let ty = demangles_type!("yt");
    let tuple = ty.root().child(0).unwrap();
    assert_eq!(tuple.kind(), Kind::Tuple);
    assert_eq!(tuple.num_children(), 0);
}

#[test]
fn function_types() {
    // repeat-count substitution: (Int) -> Int as a C function pointer
    let ty = demangles_type!("S2iXC");
    let func = ty.root().child(0).unwrap();
    assert_eq!(func.kind(), Kind::CFunctionPointer);

    let arg = func.child(0).unwrap().child(0).unwrap();
    let ret = func.child(1).unwrap().child(0).unwrap();
    // the repeated type is the same node
    assert_eq!(arg.id(), ret.id());

    // throwing function type
    let ty = demangles_type!("yyKc");
    let func = ty.root().child(0).unwrap();
    assert_eq!(func.kind(), Kind::FunctionType);
    assert_eq!(func.child(0).unwrap().kind(), Kind::ThrowsAnnotation);
}

#[test]
fn impl_function_type() {
    let ty = demangles_type!("SiSbIxir_");
    let func = ty.root().child(0).unwrap();
    assert_eq!(func.kind(), Kind::ImplFunctionType);
    assert_eq!(func.num_children(), 3);
    assert_eq!(func.child(0).unwrap().text(), Some("@callee_owned"));

    let param = func.child(1).unwrap();
    assert_eq!(param.kind(), Kind::ImplParameter);
    assert_eq!(param.child(0).unwrap().text(), Some("@in"));
    let int = param.child(1).unwrap().child(0).unwrap();
    assert_eq!(int.child(1).unwrap().text(), Some("Int"));

    let result = func.child(2).unwrap();
    assert_eq!(result.kind(), Kind::ImplResult);
    assert_eq!(result.child(0).unwrap().text(), Some("@out"));
}

#[test]
fn metatypes() {
    let ty = demangles_type!("Sim");
    let meta = ty.root().child(0).unwrap();
    assert_eq!(meta.kind(), Kind::Metatype);

    let ty = demangles_type!("SiXMt");
    let meta = ty.root().child(0).unwrap();
    assert_eq!(meta.kind(), Kind::Metatype);
    assert_eq!(meta.child(0).unwrap().text(), Some("@thin"));

    let ty = demangles_type!("4main3BarPXp");
    let meta = ty.root().child(0).unwrap();
    assert_eq!(meta.kind(), Kind::ExistentialMetatype);
}

#[test]
fn special_types() {
    let ty = demangles_type!("SiXw");
    let weak = ty.root().child(0).unwrap();
    assert_eq!(weak.kind(), Kind::Weak);

    let ty = demangles_type!("Siz");
    let inout = ty.root().child(0).unwrap();
    assert_eq!(inout.kind(), Kind::InOut);
    assert_eq!(inout.child(0).unwrap().kind(), Kind::Structure);
}

#[test]
fn protocol_composition() {
    let ty = demangles_type!("4main3BarP_4main3BazPp");
    let plist = ty.root().child(0).unwrap();
    assert_eq!(plist.kind(), Kind::ProtocolList);
    let tlist = plist.child(0).unwrap();
    assert_eq!(tlist.num_children(), 2);

    // the empty composition (Any)
    let ty = demangles_type!("yp");
    let plist = ty.root().child(0).unwrap();
    assert_eq!(plist.child(0).unwrap().num_children(), 0);
}

#[test]
fn builtins() {
    let ty = demangles_type!("Bi32_");
    assert_eq!(ty.root().child(0).unwrap().text(), Some("Builtin.Int32"));

    let ty = demangles_type!("Bb");
    assert_eq!(ty.root().child(0).unwrap().text(), Some("Builtin.BridgeObject"));

    let ty = demangles_type!("Bi32_Bv4_");
    assert_eq!(ty.root().child(0).unwrap().text(), Some("Builtin.Vec4xInt32"));

    none_type!("Bi_"); // a zero-width integer is malformed
}

#[test]
fn punycoded_identifier() {
    let ty = demangles_type!("009bcher_kva");
    assert_eq!(ty.root().kind(), Kind::Identifier);
    assert_eq!(ty.root().text(), Some("b\u{fc}cher"));
}

#[test]
fn thunks() {
    let symbol = demangles!("_T04main3fooyyFTc");
    let thunk = symbol.root().child(0).unwrap();
    assert_eq!(thunk.kind(), Kind::CurryThunk);
    assert_eq!(thunk.child(0).unwrap().kind(), Kind::Function);

    let symbol = demangles!("_T0SiSbTR");
    let thunk = symbol.root().child(0).unwrap();
    assert_eq!(thunk.kind(), Kind::ReabstractionThunkHelper);
    assert_eq!(thunk.num_children(), 2);
}

#[test]
fn generic_specialization() {
    let symbol = demangles!("_T04main3fooyyFSi_Tg0");
    let spec = symbol.root().child(0).unwrap();
    assert_eq!(spec.kind(), Kind::GenericSpecialization);

    assert_eq!(spec.child(0).unwrap().kind(), Kind::Function);
    let pass = spec.child(1).unwrap();
    assert_eq!(pass.kind(), Kind::SpecializationPassID);
    assert_eq!(pass.index(), Some(0));

    let param = spec.child(2).unwrap();
    assert_eq!(param.kind(), Kind::GenericSpecializationParam);
    let arg = param.child(0).unwrap().child(0).unwrap();
    assert_eq!(arg.child(1).unwrap().text(), Some("Int"));
}

#[test]
fn function_signature_specialization() {
    let symbol = demangles!("_T04main3fooyyFTf0dX_");
    let spec = symbol.root().child(0).unwrap();
    assert_eq!(spec.kind(), Kind::FunctionSignatureSpecialization);
    assert_eq!(spec.child(0).unwrap().kind(), Kind::Function);

    let param = spec.child(2).unwrap();
    assert_eq!(param.kind(), Kind::FunctionSignatureSpecializationParam);
    assert_eq!(param.child(0).unwrap().index(), Some(0));

    let kind = param.child(1).unwrap();
    assert_eq!(kind.kind(), Kind::FunctionSignatureSpecializationParamKind);
    let expected = SpecializationParamFlags::DEAD | SpecializationParamFlags::SROA;
    assert_eq!(kind.index(), Some(expected.bits()));

    // constant-propagated integer argument
    let symbol = demangles!("_T04main3fooyyFTf0pi42_");
    let spec = symbol.root().child(0).unwrap();
    let param = spec.child(2).unwrap();
    assert_eq!(
        param.child(1).unwrap().index(),
        Some(SpecializationParamKind::ConstantPropInteger as u64)
    );
    assert_eq!(param.child(2).unwrap().text(), Some("42"));
}

#[test]
fn witnesses() {
    let symbol = demangles!("_T0Siwxx");
    let witness = symbol.root().child(0).unwrap();
    assert_eq!(witness.kind(), Kind::ValueWitness);
    assert_eq!(witness.child(0).unwrap().index(), Some(ValueWitnessKind::Destroy as u64));

    let symbol = demangles!("_T0SiWV");
    let table = symbol.root().child(0).unwrap();
    assert_eq!(table.kind(), Kind::ValueWitnessTable);

    let symbol = demangles!("_T04main3FooV4main3BarP4mainWP");
    let table = symbol.root().child(0).unwrap();
    assert_eq!(table.kind(), Kind::ProtocolWitnessTable);
    let conf = table.child(0).unwrap();
    assert_eq!(conf.kind(), Kind::ProtocolConformance);
    assert_eq!(conf.num_children(), 3);
    assert_eq!(conf.child(2).unwrap().kind(), Kind::Module);

    let symbol = demangles!("_T04main1xSivWvd");
    let offset = symbol.root().child(0).unwrap();
    assert_eq!(offset.kind(), Kind::FieldOffset);
    assert_eq!(offset.child(0).unwrap().index(), Some(0));
    assert_eq!(offset.child(1).unwrap().kind(), Kind::Variable);
}

#[test]
fn objc_type_names() {
    let symbol = demangles!("_TtC4main3Foo");
    let mangling = symbol.root().child(0).unwrap();
    assert_eq!(mangling.kind(), Kind::TypeMangling);
    let class = mangling.child(0).unwrap().child(0).unwrap();
    assert_eq!(class.kind(), Kind::Class);
    assert_eq!(class.child(0).unwrap().text(), Some("main"));
    assert_eq!(class.child(1).unwrap().text(), Some("Foo"));

    assert!(demangle_symbol("_TtP4main3Bar_").is_some());
    none!("_TtC4main3Foo3Bar"); // trailing characters
}

#[test]
fn type_metadata_entities() {
    let symbol = demangles!("_T04main3FooVN");
    let meta = symbol.root().child(0).unwrap();
    assert_eq!(meta.kind(), Kind::TypeMetadata);

    let symbol = demangles!("_T04main3FooVMa");
    let access = symbol.root().child(0).unwrap();
    assert_eq!(access.kind(), Kind::TypeMetadataAccessFunction);
}

#[test]
fn tree_dump() {
    let symbol = demangles!("_T04main3fooyyF");
    let dump = format!("{:?}", symbol);
    assert!(dump.contains("Function"));
    assert!(dump.contains("Module(\"main\")"));
    assert!(dump.contains("Identifier(\"foo\")"));
}
