use ecs_bridge::descriptor::MAX_DESCRIPTOR_ENTRIES;
use ecs_bridge::{BridgeConfig, BridgeError, Disposable, HostValue, IterStep, MockEngine, World};

fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[test]
fn test_descriptor_integration() {
    let world = World::new(MockEngine::new());

    // 从引擎内建原语表取成员类型
    let primitives = world.primitive_types();
    let Some(&HostValue::Id(f64_id)) = primitives.get("f64") else {
        panic!("missing f64 primitive");
    };

    // 注册结构体类型
    let desc = HostValue::object([
        ("type", HostValue::from("struct")),
        (
            "members",
            HostValue::array([
                HostValue::object([
                    ("name", HostValue::from("x")),
                    ("type", HostValue::Id(f64_id)),
                ]),
                HostValue::object([
                    ("name", HostValue::from("y")),
                    ("type", HostValue::Id(f64_id)),
                ]),
            ]),
        ),
    ]);
    let struct_id = world.create_type(0, &desc).unwrap();
    assert_ne!(struct_id, 0);

    // 注册枚举类型
    let desc = HostValue::object([
        ("type", HostValue::from("enum")),
        (
            "constants",
            HostValue::array([
                HostValue::object([
                    ("name", HostValue::from("Red")),
                    ("value", HostValue::from(0.0)),
                ]),
                HostValue::object([
                    ("name", HostValue::from("Green")),
                    ("value", HostValue::from(1.0)),
                ]),
            ]),
        ),
    ]);
    let enum_id = world.create_type(0, &desc).unwrap();
    assert_ne!(enum_id, struct_id);

    // 超出容量上限的描述符被整体拒绝,不产生类型id
    let too_many: Vec<HostValue> = (0..=MAX_DESCRIPTOR_ENTRIES)
        .map(|i| {
            HostValue::object([
                ("name", HostValue::from(format!("m{i}").as_str())),
                ("type", HostValue::Id(f64_id)),
            ])
        })
        .collect();
    let desc = HostValue::object([
        ("type", HostValue::from("struct")),
        ("members", HostValue::Array(too_many)),
    ]);
    let err = world.create_type(0, &desc).unwrap_err();
    assert!(matches!(err, BridgeError::Capacity { len: 33, .. }));

    // 验证引擎仅收到前两次注册
    let engine = world.engine();
    let engine = engine.lock().unwrap();
    assert_eq!(engine.registered.len(), 2);
    assert_eq!(engine.struct_calls, 1);
    assert_eq!(engine.enum_calls, 1);
}

#[test]
fn test_iteration_integration() {
    let mut engine = MockEngine::new();
    let parent = engine.add_entity("parent");
    let expected: Vec<u64> = (0..5)
        .map(|i| engine.add_child(parent, &format!("child{i}")))
        .collect();
    engine.batch_size = 2;
    let world = World::new(engine);

    // 按批遍历全部子实体
    let mut iter = world.children(parent).unwrap();
    let mut seen = Vec::new();
    loop {
        match iter.next().unwrap() {
            IterStep::Batch(ids) => seen.extend(ids),
            IterStep::Done => break,
        }
    }
    assert_eq!(seen, expected);

    // 结束后迭代器保持终止态
    assert_eq!(iter.next().unwrap(), IterStep::Done);
    iter.done().unwrap();

    let engine = world.engine();
    let engine = engine.lock().unwrap();
    assert_eq!(engine.iterators_released, 1);
    assert_eq!(engine.live_handles(), 0);
}

#[test]
fn test_query_integration() {
    let mut engine = MockEngine::new();
    let root = engine.add_entity("root");
    let world = World::new(engine);

    let query = world.query("Position, (ChildOf, $parent)").unwrap();

    // 绑定变量并执行
    let options = HostValue::object([(
        "variables",
        HostValue::object([("parent", HostValue::from("root"))]),
    )]);
    let snapshot: serde_json::Value =
        serde_json::from_str(&query.exec(Some(&options)).unwrap()).unwrap();
    assert_eq!(snapshot["vars"]["parent"], root);

    // 查询可反复执行
    let again: serde_json::Value =
        serde_json::from_str(&query.exec(Some(&options)).unwrap()).unwrap();
    assert_eq!(snapshot, again);

    // 内省透传
    assert_eq!(
        query.to_query_string().unwrap(),
        "Position, (ChildOf, $parent)"
    );
    assert!(query.plan().unwrap().contains("scan"));
    assert_eq!(query.find_var("parent").unwrap(), Some(0));
    assert_eq!(query.var_name(0).unwrap(), "parent");
    assert!(query.var_is_entity(0).unwrap());
}

#[test]
fn test_script_integration() {
    let world = World::new(MockEngine::new());

    let script = world
        .parse("motion.ecs", "box { speed: $speed, label: $label }")
        .unwrap();

    // 首次求值
    let vars = HostValue::object([
        ("speed", HostValue::from(2.5)),
        ("label", HostValue::from("crate")),
    ]);
    script.eval(Some(&vars)).unwrap();

    // 同一脚本可用不同变量再次求值
    let vars = HostValue::object([
        ("speed", HostValue::from(9.0)),
        ("label", HostValue::from("barrel")),
    ]);
    script.eval(Some(&vars)).unwrap();

    let engine = world.engine();
    assert_eq!(engine.lock().unwrap().evaluations, 2);
}

#[test]
fn test_disposal_integration() {
    let mut engine = MockEngine::new();
    let root = engine.add_entity("root");
    let world = World::new(engine);

    let mut handles: Vec<Box<dyn Disposable>> = vec![
        Box::new(world.children(root).unwrap()),
        Box::new(world.query("Position").unwrap()),
        Box::new(world.parse("a.ecs", "box { x: 1 }").unwrap()),
    ];

    // 显式释放全部句柄,重复释放是无操作
    for handle in &mut handles {
        handle.dispose().unwrap();
        assert!(handle.is_disposed());
        handle.dispose().unwrap();
    }
    drop(handles);

    let engine = world.engine();
    let engine = engine.lock().unwrap();
    assert_eq!(engine.live_handles(), 0);
    assert_eq!(engine.iterators_released, 1);
    assert_eq!(engine.queries_released, 1);
    assert_eq!(engine.scripts_released, 1);
}

#[test]
fn test_error_reporting_integration() {
    let world = World::new(MockEngine::new());

    // 编译失败不留句柄
    assert!(world.query("Position, (ChildOf").is_err());

    // 非零求值状态映射为错误
    let script = world.parse("bad.ecs", "box { speed: $speed }").unwrap();
    let err = script.eval(None).unwrap_err();
    assert_eq!(
        err.to_string(),
        "script evaluation failed with status 1"
    );

    let engine = world.engine();
    assert_eq!(engine.lock().unwrap().live_handles(), 1);
}

#[test]
fn test_full_bridge_session() -> anyhow::Result<()> {
    init_tracing();

    // 构造引擎并播种场景
    let mut engine = MockEngine::new();
    let root = engine.add_entity("root");
    let box_a = engine.add_child(root, "box_a");
    let box_b = engine.add_child(root, "box_b");
    engine.batch_size = 1;

    // 从TOML配置构造桥接世界
    let config = BridgeConfig::from_toml_str("[query]\nmatches = true")?;
    let world = World::with_config(engine, config);

    // 注册类型
    let primitives = world.primitive_types();
    let Some(&HostValue::Id(f64_id)) = primitives.get("f64") else {
        anyhow::bail!("missing f64 primitive");
    };
    let desc = HostValue::object([
        ("type", HostValue::from("struct")),
        (
            "members",
            HostValue::array([HostValue::object([
                ("name", HostValue::from("speed")),
                ("type", HostValue::Id(f64_id)),
            ])]),
        ),
    ]);
    world.create_type(0, &desc)?;

    // 遍历子实体
    let mut children = world.children(root)?;
    let mut seen = Vec::new();
    loop {
        match children.next()? {
            IterStep::Batch(ids) => seen.extend(ids),
            IterStep::Done => break,
        }
    }
    children.done()?;
    assert_eq!(seen, vec![box_a, box_b]);

    // 带默认快照开关执行查询
    let query = world.query("Position, (ChildOf, $parent)")?;
    let options = HostValue::object([(
        "variables",
        HostValue::object([("parent", HostValue::Id(root))]),
    )]);
    let snapshot: serde_json::Value = serde_json::from_str(&query.exec(Some(&options))?)?;
    assert_eq!(snapshot["vars"]["parent"], root);
    assert_eq!(snapshot["flags"]["matches"], true);

    // 求值脚本
    let script = world.parse("session.ecs", "box { speed: $speed }")?;
    script.eval(Some(&HostValue::object([(
        "speed",
        HostValue::from(2.5),
    )])))?;

    // 审计句柄泄漏
    drop(query);
    drop(script);
    let engine = world.engine();
    let engine = engine.lock().unwrap();
    assert_eq!(engine.live_handles(), 0);
    assert_eq!(engine.iterators_created, engine.iterators_released);
    assert_eq!(engine.queries_created, engine.queries_released);
    assert_eq!(engine.scripts_created, engine.scripts_released);
    Ok(())
}
