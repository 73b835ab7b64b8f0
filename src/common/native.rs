use std::fmt;

use tracing::trace;

use crate::common::{
    fault::Fault,
    table::Table,
    value::Value,
};

/// A primitive provided by the host.
/// Returns the result, or the error value to raise in the calling fiber.
pub trait NativeFunction {
    fn call(&self, args: &[Value]) -> Result<Value, Value>;
}

impl<F> NativeFunction for F
where
    F: Fn(&[Value]) -> Result<Value, Value>,
{
    fn call(&self, args: &[Value]) -> Result<Value, Value> { self(args) }
}

/// A named host primitive, callable from the runtime.
pub struct Native {
    name: String,
    fun:  Box<dyn NativeFunction>,
}

impl Native {
    pub fn new<F>(name: &str, fun: F) -> Native
    where
        F: Fn(&[Value]) -> Result<Value, Value> + 'static,
    {
        Native::with(name, fun)
    }

    /// Wraps anything implementing [`NativeFunction`],
    /// such as a struct carrying its own state.
    pub fn with(name: &str, fun: impl NativeFunction + 'static) -> Native {
        Native {
            name: name.to_string(),
            fun:  Box::new(fun),
        }
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn call(&self, args: &[Value]) -> Result<Value, Value> {
        trace!(name = %self.name, argc = args.len(), "calling native");
        self.fun.call(args)
    }

    /// The interpreter's calling convention:
    /// the first `argc` cells of `argv` are the arguments,
    /// the result is written to `ret`, and the returned status is
    /// `0` on success or `1` if `ret` holds an error value instead.
    pub fn invoke(&self, argc: i32, argv: &[Value], ret: &mut Value) -> i32 {
        let args = match usize::try_from(argc).ok().and_then(|argc| argv.get(..argc)) {
            Some(args) => args,
            None => {
                *ret = Value::string(format!(
                    "{} called with {} arguments but {} were supplied",
                    self.name,
                    argc,
                    argv.len()
                ));
                return 1;
            },
        };

        match self.call(args) {
            Ok(value) => {
                *ret = value;
                0
            },
            Err(error) => {
                *ret = error;
                1
            },
        }
    }
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Native({})", self.name) }
}

/// One entry of a library of primitives.
#[derive(Clone, Copy)]
pub struct Reg {
    pub name:     &'static str,
    pub function: fn(&[Value]) -> Result<Value, Value>,
}

/// Installs each primitive into `env` under its name as a symbol.
pub fn register(env: &mut Table, regs: &[Reg]) -> Result<(), Fault> {
    for reg in regs {
        env.put(
            Value::symbol(reg.name),
            Value::native(Native::new(reg.name, reg.function)),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn add(args: &[Value]) -> Result<Value, Value> {
        let mut total = 0i32;
        for arg in args {
            let n = arg.as_integer().map_err(|f| Value::string(f.to_string()))?;
            total = total.checked_add(n).ok_or_else(|| Value::string("overflow"))?;
        }
        Ok(Value::integer(total))
    }

    fn first(args: &[Value]) -> Result<Value, Value> { Ok(args.first().cloned().unwrap_or_default()) }

    #[test]
    fn status_convention() {
        let native = Native::new("+", add);
        let argv = [Value::integer(1), Value::integer(2), Value::string("ignored")];
        let mut ret = Value::nil();

        assert_eq!(native.invoke(2, &argv, &mut ret), 0);
        assert_eq!(ret, Value::integer(3));

        assert_eq!(native.invoke(3, &argv, &mut ret), 1);
        assert!(ret.check(crate::common::data::Kind::String));

        assert_eq!(native.invoke(4, &argv, &mut ret), 1);
        assert_eq!(native.invoke(-1, &argv, &mut ret), 1);
    }

    #[test]
    fn stateful() {
        struct Constant(Value);
        impl NativeFunction for Constant {
            fn call(&self, _: &[Value]) -> Result<Value, Value> { Ok(self.0.clone()) }
        }

        let native = Native::with("seven", Constant(Value::integer(7)));
        assert_eq!(native.call(&[]), Ok(Value::integer(7)));
        assert_eq!(native.name(), "seven");
    }

    #[test]
    fn library() {
        let mut env = Table::new();
        register(
            &mut env,
            &[
                Reg { name: "+", function: add },
                Reg { name: "first", function: first },
            ],
        )
        .unwrap();

        assert_eq!(env.count(), 2);
        let native = env.get(&Value::symbol("first")).unwrap().as_native().unwrap();
        assert_eq!(native.name(), "first");
        assert_eq!(native.call(&[Value::integer(9)]), Ok(Value::integer(9)));
    }
}
