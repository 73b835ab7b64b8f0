//! Whole-fiber scenarios: calls, growth, captured environments,
//! and control transfer between fibers.

use std::rc::Rc;

use dst::{
    Closure,
    Fault,
    FiberConfig,
    FiberHandle,
    FiberStatus,
    Kind,
    LambdaBuilder,
    Signal,
    Value,
    FRAME_SIZE,
};

fn function(arity: usize, slots: usize) -> Rc<Closure> {
    Rc::new(Closure::wrap(LambdaBuilder::new().arity(arity).slotcount(slots).build()))
}

fn fiber(initial: usize) -> FiberHandle {
    FiberHandle::new(FiberConfig::default().with_initial_capacity(initial))
}

/// Makes closures over the current frame's locals.
fn capturing() -> Rc<dst::Lambda> { Rc::new(LambdaBuilder::new().environment(-1).build()) }

#[test]
fn growth_doubles_and_preserves_frames() {
    let handle = fiber(16);
    let mut fiber = handle.try_borrow_mut().unwrap();

    fiber.push(Value::integer(1)).unwrap();
    fiber.push(Value::string("two")).unwrap();
    fiber.push_frame(function(2, 4), 2).unwrap();
    fiber.set_local(3, Value::real(3.5)).unwrap();
    assert_eq!(fiber.capacity(), 16);

    let frametop = fiber.frametop();
    let snapshot = fiber.stack()[..frametop].to_vec();

    fiber.push_frame(function(0, 20), 0).unwrap();
    assert_eq!(fiber.capacity(), 32);
    assert_eq!(&fiber.stack()[..frametop], &snapshot[..]);

    fiber.pop_frame().unwrap();
    assert_eq!(fiber.local(0), Ok(Value::integer(1)));
    assert_eq!(fiber.local(1), Ok(Value::string("two")));
    assert_eq!(fiber.local(3), Ok(Value::real(3.5)));
}

#[test]
fn frames_survive_growth() {
    let handle = fiber(4);
    let mut fiber = handle.try_borrow_mut().unwrap();
    let start = (fiber.frame(), fiber.frametop(), fiber.stacktop());
    assert_eq!(start, (0, 0, FRAME_SIZE));

    let closures = [function(0, 2), function(0, 5), function(0, 9)];
    let mut cursors = vec![];
    for closure in closures.iter() {
        cursors.push((fiber.frame(), fiber.frametop(), fiber.stacktop()));
        fiber.push_frame(Rc::clone(closure), 0).unwrap();
    }
    assert!(fiber.capacity() > 4);

    let frames = fiber.frames().unwrap();
    assert_eq!(frames.len(), 3);
    for (frame, closure) in frames.iter().zip(closures.iter().rev()) {
        assert!(Rc::ptr_eq(&frame.closure, closure));
    }
    assert_eq!(frames[2].prevframe, 0);

    while let Some(cursor) = cursors.pop() {
        fiber.pop_frame().unwrap();
        assert_eq!((fiber.frame(), fiber.frametop(), fiber.stacktop()), cursor);
    }
    assert_eq!((fiber.frame(), fiber.frametop(), fiber.stacktop()), start);
    assert_eq!(fiber.pop_frame().err(), Some(Fault::NoFrame));
}

#[test]
fn env_closes_with_its_frame() {
    let handle = fiber(8);
    let (closure, snapshot) = {
        let mut fiber = handle.try_borrow_mut().unwrap();
        fiber.push(Value::symbol("a")).unwrap();
        fiber.push(Value::integer(2)).unwrap();
        fiber.push_frame(function(2, 3), 2).unwrap();
        fiber.set_local(2, Value::boolean(true)).unwrap();

        let closure = fiber.closure(capturing()).unwrap();
        assert!(closure.envs[0].is_open());
        assert!(closure.envs[0].offset() > 0);

        let snapshot = (0..3).map(|i| fiber.local(i).unwrap()).collect::<Vec<_>>();
        fiber.pop_frame().unwrap();
        (closure, snapshot)
    };

    let env = &closure.envs[0];
    assert!(!env.is_open());
    assert!(env.offset() <= 0);
    assert_eq!(env.values().unwrap(), snapshot);

    // closing again changes nothing
    env.close().unwrap();
    env.close().unwrap();
    assert_eq!(env.values().unwrap(), snapshot);
}

#[test]
fn closed_envs_outlive_stack_reuse() {
    let handle = fiber(8);
    let mut fiber = handle.try_borrow_mut().unwrap();

    fiber.push(Value::integer(100)).unwrap();
    fiber.push_frame(function(1, 2), 1).unwrap();
    let closure = fiber.closure(capturing()).unwrap();
    fiber.pop_frame().unwrap();

    // a new frame over the same cells
    fiber.push(Value::integer(-1)).unwrap();
    fiber.push_frame(function(1, 2), 1).unwrap();
    fiber.set_local(1, Value::string("scribble")).unwrap();

    assert_eq!(closure.envs[0].get(0), Ok(Value::integer(100)));
    assert_eq!(closure.envs[0].get(1), Ok(Value::nil()));

    // and the closure still reads its own values when called
    fiber.push_frame(Rc::clone(&closure), 0).unwrap();
    assert_eq!(fiber.load_upvalue(0, 0), Ok(Value::integer(100)));
    fiber.store_upvalue(0, 1, Value::integer(7)).unwrap();
    fiber.pop_frame().unwrap();

    assert_eq!(fiber.local(1), Ok(Value::string("scribble")));
    assert_eq!(closure.envs[0].get(1), Ok(Value::integer(7)));
}

#[test]
fn cancelling_closes_everything() {
    let handle = fiber(8);
    handle.resume(None).unwrap();

    let envs = {
        let mut fiber = handle.try_borrow_mut().unwrap();
        let mut envs = vec![];
        for depth in 0..3 {
            fiber.push(Value::integer(depth)).unwrap();
            fiber.push_frame(function(1, 1), 1).unwrap();
            envs.push(fiber.closure(capturing()).unwrap());
        }
        assert_eq!(fiber.open_envs(), 3);

        let transfer = fiber.cancel(Value::string("cancelled")).unwrap();
        assert_eq!(transfer.signal, Signal::Error(Value::string("cancelled")));
        assert_eq!(fiber.open_envs(), 0);
        assert_eq!((fiber.frame(), fiber.frametop(), fiber.stacktop()), (0, 0, FRAME_SIZE));
        envs
    };

    for (depth, closure) in envs.iter().enumerate() {
        assert!(!closure.envs[0].is_open());
        assert_eq!(closure.envs[0].get(0), Ok(Value::integer(depth as i32)));
    }

    assert_eq!(handle.status(), Ok(FiberStatus::Error));
    assert_eq!(handle.resume(None), Err(Fault::FiberNotAlive(FiberStatus::Error)));
    assert_eq!(
        handle.try_borrow_mut().unwrap().push_frame(function(0, 0), 0),
        Err(Fault::FiberNotAlive(FiberStatus::Error))
    );
}

#[test]
fn closures_cross_fibers() {
    let parent = fiber(8);
    let child = fiber(8);
    parent.resume(None).unwrap();
    child.resume(Some(&parent)).unwrap();

    let closure = {
        let mut child = child.try_borrow_mut().unwrap();
        child.push(Value::integer(5)).unwrap();
        child.push_frame(function(1, 1), 1).unwrap();
        let closure = child.closure(capturing()).unwrap();

        let transfer = child.suspend(Value::symbol("paused")).unwrap();
        assert_eq!(transfer.signal, Signal::Yield(Value::symbol("paused")));
        assert!(transfer.parent.unwrap().ptr_eq(&parent));
        closure
    };

    // the child is suspended, its frame and the env are still live
    {
        let mut running = parent.try_borrow_mut().unwrap();
        running.push_frame(Rc::clone(&closure), 0).unwrap();
        assert_eq!(running.load_upvalue(0, 0), Ok(Value::integer(5)));
        running.store_upvalue(0, 0, Value::integer(6)).unwrap();
        running.pop_frame().unwrap();
    }

    assert!(closure.envs[0].is_open());
    assert_eq!(child.try_borrow().unwrap().local(0), Ok(Value::integer(6)));
    assert_eq!(child.status(), Ok(FiberStatus::Alive));

    // the child finishes, the env closes, the parent gets the result
    let transfer = child.try_borrow_mut().unwrap().return_frame(Value::nil()).unwrap().unwrap();
    assert_eq!(transfer.signal, Signal::Return(Value::nil()));
    assert_eq!(child.status(), Ok(FiberStatus::Dead));
    assert!(!closure.envs[0].is_open());
    assert_eq!(closure.envs[0].get(0), Ok(Value::integer(6)));
}

#[test]
fn fibers_are_values() {
    let handle = fiber(8);
    let value = Value::fiber(handle.clone());
    assert_eq!(value.kind(), Kind::Fiber);
    assert!(value.truthy());
    assert!(value.as_fiber().unwrap().ptr_eq(&handle));
    assert_eq!(value, Value::fiber(handle.clone()));
    assert_ne!(value, Value::fiber(fiber(8)));
}

#[test]
fn dropped_fibers_detach_nothing() {
    let handle = fiber(8);
    let closure = {
        let mut fiber = handle.try_borrow_mut().unwrap();
        fiber.push(Value::string("last words")).unwrap();
        fiber.push_frame(function(1, 1), 1).unwrap();
        fiber.closure(capturing()).unwrap()
    };

    drop(handle);
    assert!(!closure.envs[0].is_open());
    assert_eq!(closure.envs[0].values(), Ok(vec![Value::string("last words")]));
}
