//! The built-in language catalog.
//!
//! One constructor per supported language, plus [`all`] which enumerates the
//! whole set for registry discovery. Each descriptor carries a reference
//! program that prints `42`, used by `polybox check`.

use crate::lang::LanguageDescriptor;
use crate::program::Program;

pub fn ada() -> LanguageDescriptor {
    LanguageDescriptor::new("Ada")
        .source_ext(".adb")
        .compiler(Program::new("gnatmake").opts(["-f"]))
        .reference(
            r#"with Ada.Text_IO; use Ada.Text_IO;
procedure Hello is
begin
    Put_Line("42");
end Hello;
"#,
        )
}

pub fn c() -> LanguageDescriptor {
    LanguageDescriptor::new("C")
        .source_ext(".c")
        .compiler(Program::new("gcc").opts(["-std=c11", "-Wall", "-Wextra", "-O2", "-lm"]))
        .reference(
            r#"#include <stdio.h>

int main(void)
{
    printf("42\n");
    return 0;
}
"#,
        )
}

pub fn cxx() -> LanguageDescriptor {
    LanguageDescriptor::new("C++")
        .source_ext(".cc")
        .compiler(Program::new("g++").opts(["-std=c++17", "-Wall", "-Wextra", "-O2"]))
        .reference(
            r#"#include <iostream>
int main()
{
    std::cout << 42 << std::endl;
    return 0;
}
"#,
        )
}

pub fn csharp() -> LanguageDescriptor {
    LanguageDescriptor::new("C#")
        .source_ext(".cs")
        .compiler(Program::new("mcs").opts(["-optimize+"]))
        .interpreter(Program::new("mono"))
        .allowed_dir("/etc/mono")
        // mcs rejects "-out" and its value as two tokens
        .compile_args(["-out:{output}", "{source}"])
        .reference(
            r#"using System;
class Program
{
    public static void Main()
    {
        Console.WriteLine(42);
    }
}
"#,
        )
}

pub fn d() -> LanguageDescriptor {
    LanguageDescriptor::new("D")
        .source_ext(".d")
        .compiler(Program::new("dmd"))
        .allowed_dir("/etc")
        // '-of' and its value as two distinct arguments is illegal
        .compile_args(["-of{output}", "{source}"])
        .reference(
            r#"void main()
{
    import std.stdio: writeln;
    writeln("42");
}
"#,
        )
}

pub fn go() -> LanguageDescriptor {
    LanguageDescriptor::new("Go")
        .source_ext(".go")
        .compiler(
            Program::new("go")
                .opts(["build", "-buildmode=exe"])
                .env("GOCACHE", "/box/.gocache")
                .probe_flag("version"),
        )
        .reference(
            r#"package main
import "fmt"
func main() {
    fmt.Println("42")
}
"#,
        )
}

pub fn haskell() -> LanguageDescriptor {
    LanguageDescriptor::new("Haskell")
        .source_ext(".hs")
        .compiler(Program::new("ghc").opts(["-dynamic", "-O2"]))
        .reference("module Main where main = putStrLn \"42\"\n")
}

pub fn javascript() -> LanguageDescriptor {
    LanguageDescriptor::new("Javascript")
        .source_ext(".js")
        .interpreter(Program::new("node"))
        .reference("process.stdout.write('42\\n');\n")
}

pub fn lua() -> LanguageDescriptor {
    LanguageDescriptor::new("Lua")
        .source_ext(".lua")
        .interpreter(Program::new("lua").probe_flag("-v"))
        .reference("print(\"42\")\n")
}

pub fn ocaml() -> LanguageDescriptor {
    LanguageDescriptor::new("OCaml")
        .source_ext(".ml")
        .compiler(Program::new("ocamlopt").opts(["-w", "A"]).probe_flag("-v"))
        .reference("print_int 42; print_string \"\\n\";\n")
}

pub fn pascal() -> LanguageDescriptor {
    LanguageDescriptor::new("Pascal")
        .source_ext(".pas")
        .compiler(Program::new("fpc").opts(["-XD", "-Fainitc"]).probe_flag("-h"))
        .compile_args(["-o{output}", "{source}"])
        .reference(
            r#"program main;
begin
    Writeln(42);
end.
"#,
        )
}

pub fn perl() -> LanguageDescriptor {
    LanguageDescriptor::new("Perl")
        .source_ext(".pl")
        .interpreter(Program::new("perl"))
        .reference("print \"42\\n\";\n")
}

pub fn php() -> LanguageDescriptor {
    LanguageDescriptor::new("PHP")
        .source_ext(".php")
        .interpreter(Program::new("php"))
        .reference("<?php\necho \"42\\n\";\n?>\n")
}

pub fn prolog() -> LanguageDescriptor {
    LanguageDescriptor::new("Prolog")
        .source_ext(".pl")
        .interpreter(Program::new("swipl").opts(["--quiet", "-t", "halt"]))
        .reference(":- write('42\\n').\n")
}

pub fn python() -> LanguageDescriptor {
    LanguageDescriptor::new("Python")
        .source_ext(".py")
        .interpreter(Program::new("python3").opts(["-S"]))
        .reference("print(\"42\")\n")
}

pub fn ruby() -> LanguageDescriptor {
    LanguageDescriptor::new("Ruby")
        .source_ext(".rb")
        .interpreter(Program::new("ruby"))
        .reference("puts \"42\"\n")
}

pub fn rust() -> LanguageDescriptor {
    LanguageDescriptor::new("Rust")
        .source_ext(".rs")
        .compiler(Program::new("rustc").opts(["-W", "warnings", "-C", "opt-level=3"]))
        .reference("fn main() {\n    println!(\"42\");\n}\n")
}

pub fn scheme() -> LanguageDescriptor {
    LanguageDescriptor::new("Scheme")
        .source_ext(".scm")
        .interpreter(Program::new("gsi").probe_flag("-v"))
        .reference("(display \"42\")(newline)\n")
}

/// The predeclared discovery list, in registration order.
pub fn all() -> Vec<LanguageDescriptor> {
    vec![
        ada(),
        c(),
        cxx(),
        csharp(),
        d(),
        go(),
        haskell(),
        javascript(),
        lua(),
        ocaml(),
        pascal(),
        perl(),
        php(),
        prolog(),
        python(),
        ruby(),
        rust(),
        scheme(),
    ]
}
