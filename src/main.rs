fn main() -> anyhow::Result<()> {
    toonmesh::run()
}
